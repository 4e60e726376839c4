//  Copyright 2024, The Tari Project
//
//  Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
//  following conditions are met:
//
//  1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
//  disclaimer.
//
//  2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
//  following disclaimer in the documentation and/or other materials provided with the distribution.
//
//  3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
//  products derived from this software without specific prior written permission.
//
//  THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
//  INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
//  DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
//  SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//  SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
//  WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
//  USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{convert::TryFrom, sync::Arc};

use log::*;
use ridge_shutdown::ShutdownSignal;
use tokio::{
    sync::{broadcast::error::RecvError, RwLock},
    task::JoinHandle,
};

use super::{
    chain_split::find_common_ancestor,
    rpc::{BlockSyncRpcService, SyncRpcClient, BLOCK_SYNC_PROTOCOL},
    BlockSyncError,
    PeerRegistry,
    Skeleton,
    Status,
    SyncPeer,
};
use crate::{
    blocks::{Block, BlockHeader, Difficulty},
    chain_storage::{Blockchain, ChainEvent},
    config::BlockSyncConfig,
    connectivity::{ConnectivityEvent, ConnectivityEventRx, SyncTransport},
    peer::PeerId,
    proto::NotifyRequest,
};

const LOG_TARGET: &str = "r::bn::block_sync";

/// Keeps the local chain in sync with connected peers.
///
/// The syncer tracks the local chain status, the connected peers and their advertised status. Syncing with a peer is
/// driven by the caller: pick a peer with [best_peer](Self::best_peer), then run
/// [sync_with_peer](Self::sync_with_peer) (or its two phases separately) in a task dedicated to that peer.
pub struct Syncer<B> {
    config: BlockSyncConfig,
    db: Arc<B>,
    peers: PeerRegistry,
    status: RwLock<Status>,
}

impl<B: Blockchain> Syncer<B> {
    pub fn new(config: BlockSyncConfig, db: Arc<B>) -> Result<Self, BlockSyncError> {
        config.validate()?;
        let status = local_status(&*db)?;
        info!(target: LOG_TARGET, "Local chain is at {}", status);
        Ok(Self {
            config,
            db,
            peers: PeerRegistry::new(),
            status: RwLock::new(status),
        })
    }

    pub fn config(&self) -> &BlockSyncConfig {
        &self.config
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// The local chain status
    pub async fn status(&self) -> Status {
        self.status.read().await.clone()
    }

    /// Registers the sync service with the transport, then starts tracking the local chain and connection events.
    /// Both background tasks stop when `shutdown` is triggered.
    pub fn start<T: SyncTransport>(
        self: &Arc<Self>,
        transport: Arc<T>,
        shutdown: ShutdownSignal,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        transport.register_protocol(BLOCK_SYNC_PROTOCOL, Arc::new(BlockSyncRpcService::new(self.clone())));
        let status_tracker = self.spawn_status_tracker(shutdown.clone());
        let events = transport.subscribe_events();
        let connectivity = tokio::spawn(self.clone().run_connectivity_loop(transport, events, shutdown));
        (status_tracker, connectivity)
    }

    /// Spawns the task that keeps the local status in line with the chain's canonical tip
    pub fn spawn_status_tracker(self: &Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        // Subscribe before spawning so that no chain event is missed after this call returns
        let events = self.db.subscribe_events();
        let syncer = self.clone();
        tokio::spawn(syncer.track_status(events, shutdown))
    }

    async fn track_status(
        self: Arc<Self>,
        mut events: tokio::sync::broadcast::Receiver<Arc<ChainEvent>>,
        mut shutdown: ShutdownSignal,
    ) {
        // The tip may have moved between construction and subscribing
        match local_status(&*self.db) {
            Ok(status) => *self.status.write().await = status,
            Err(err) => error!(target: LOG_TARGET, "Failed to read local chain status: {}", err),
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_chain_event(&event).await,
                    Err(RecvError::Lagged(n)) => {
                        warn!(target: LOG_TARGET, "Status tracker lagged behind by {} chain event(s)", n);
                    },
                    Err(RecvError::Closed) => {
                        info!(target: LOG_TARGET, "Chain event stream closed, status tracker stopped");
                        break;
                    },
                },
                _ = shutdown.wait() => {
                    info!(target: LOG_TARGET, "Status tracker shutting down");
                    break;
                },
            }
        }
    }

    async fn handle_chain_event(&self, event: &ChainEvent) {
        match event.new_tip() {
            Some((header, difficulty)) => {
                let status = Status::from_header(header, *difficulty);
                debug!(target: LOG_TARGET, "Local chain moved to {} ({})", status, event);
                *self.status.write().await = status;
            },
            None => trace!(target: LOG_TARGET, "Ignoring chain event {}", event),
        }
    }

    async fn run_connectivity_loop<T: SyncTransport>(
        self: Arc<Self>,
        transport: Arc<T>,
        mut events: ConnectivityEventRx,
        mut shutdown: ShutdownSignal,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_connectivity_event(&*transport, &event).await,
                    Err(RecvError::Lagged(n)) => {
                        warn!(target: LOG_TARGET, "Connectivity loop lagged behind by {} event(s)", n);
                        // Missed disconnects would otherwise leave dead sessions registered
                        let num_removed = self.remove_closed_peers().await;
                        if num_removed > 0 {
                            info!(target: LOG_TARGET, "Removed {} closed peer session(s) after lagging", num_removed);
                        }
                    },
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.wait() => {
                    info!(target: LOG_TARGET, "Connectivity loop shutting down");
                    break;
                },
            }
        }
    }

    async fn handle_connectivity_event<T: SyncTransport>(&self, transport: &T, event: &ConnectivityEvent) {
        match event {
            ConnectivityEvent::PeerConnected(peer_id) => {
                let client = match transport.connect_rpc(peer_id, BLOCK_SYNC_PROTOCOL).await {
                    Ok(client) => client,
                    Err(err) => {
                        warn!(
                            target: LOG_TARGET,
                            "Failed to open sync session with peer `{}`: {}",
                            peer_id.short_str(),
                            err
                        );
                        return;
                    },
                };
                if let Err(err) = self.handle_new_peer(*peer_id, client).await {
                    warn!(
                        target: LOG_TARGET,
                        "Failed to register peer `{}`: {}",
                        peer_id.short_str(),
                        err
                    );
                }
            },
            ConnectivityEvent::PeerDisconnected(peer_id) => {
                if let Err(err) = self.delete_peer(peer_id).await {
                    warn!(
                        target: LOG_TARGET,
                        "Error closing peer `{}`: {}",
                        peer_id.short_str(),
                        err
                    );
                }
            },
        }
    }

    /// Fetches the peer's status and registers it. Nothing is registered if the status cannot be fetched.
    pub async fn handle_new_peer(
        &self,
        peer_id: PeerId,
        client: Arc<dyn SyncRpcClient>,
    ) -> Result<Arc<SyncPeer>, BlockSyncError> {
        let status = match fetch_status(&*client).await {
            Ok(status) => status,
            Err(err) => {
                if let Err(close_err) = client.close().await {
                    debug!(target: LOG_TARGET, "Failed to close client: {}", close_err);
                }
                return Err(err);
            },
        };
        info!(
            target: LOG_TARGET,
            "Peer `{}` connected at {}",
            peer_id.short_str(),
            status
        );
        let peer = Arc::new(SyncPeer::new(peer_id, client, status, self.config.max_queued_blocks));
        if let Some(replaced) = self.peers.insert(peer.clone()).await {
            debug!(
                target: LOG_TARGET,
                "Peer `{}` reconnected, closing previous session",
                peer_id.short_str()
            );
            replaced.close().await?;
        }
        Ok(peer)
    }

    /// Removes the peer and closes its connection. Deleting an unknown peer is a no-op.
    pub async fn delete_peer(&self, peer_id: &PeerId) -> Result<(), BlockSyncError> {
        if let Some(peer) = self.peers.remove(peer_id).await {
            info!(target: LOG_TARGET, "Peer `{}` disconnected", peer_id.short_str());
            peer.close().await?;
        }
        Ok(())
    }

    /// Deletes every registered peer whose connection is closed. Returns the number of peers removed.
    pub async fn remove_closed_peers(&self) -> usize {
        let removed = self.peers.remove_closed().await;
        for peer in &removed {
            info!(target: LOG_TARGET, "{} connection is closed, removed", peer);
            if let Err(err) = peer.close().await {
                debug!(target: LOG_TARGET, "Error closing {}: {}", peer, err);
            }
        }
        removed.len()
    }

    pub async fn peer(&self, peer_id: &PeerId) -> Option<Arc<SyncPeer>> {
        self.peers.get(peer_id).await
    }

    pub async fn num_peers(&self) -> usize {
        self.peers.len().await
    }

    /// Replaces the peer's status. Returns false if the peer is not registered.
    pub async fn update_peer_status(&self, peer_id: &PeerId, status: Status) -> bool {
        match self.peers.get(peer_id).await {
            Some(peer) => {
                peer.update_status(status).await;
                true
            },
            None => false,
        }
    }

    /// Queues a block broadcast by the peer. Returns false if the peer is not registered.
    pub async fn enqueue_block(&self, peer_id: &PeerId, block: Block) -> bool {
        match self.peers.get(peer_id).await {
            Some(peer) => {
                debug!(
                    target: LOG_TARGET,
                    "Peer `{}` broadcast block #{}",
                    peer_id.short_str(),
                    block.number()
                );
                peer.append_block(block).await;
                true
            },
            None => false,
        }
    }

    /// Notifies every registered peer of a new local block. Returns the number of peers notified successfully.
    pub async fn broadcast(&self, block: &Block) -> Result<usize, BlockSyncError> {
        let hash = block.hash();
        let difficulty = self
            .db
            .get_total_difficulty(&hash)?
            .unwrap_or_else(|| Difficulty::from(block.header.difficulty));
        let request = NotifyRequest {
            status: Some(Status::from_header(&block.header, difficulty).into()),
            block: block.to_bytes()?,
        };

        let peers = self.peers.snapshot().await;
        let mut num_notified = 0;
        for peer in &peers {
            match peer.client().notify(request.clone()).await {
                Ok(_) => num_notified += 1,
                Err(err) => warn!(
                    target: LOG_TARGET,
                    "Failed to notify {} of block #{} `{}`: {}",
                    peer,
                    block.number(),
                    hash,
                    err
                ),
            }
        }
        debug!(
            target: LOG_TARGET,
            "Broadcast block #{} to {}/{} peer(s)",
            block.number(),
            num_notified,
            peers.len()
        );
        Ok(num_notified)
    }

    /// Returns the peer with the highest total difficulty, if it strictly exceeds the local chain's
    pub async fn best_peer(&self) -> Result<Option<Arc<SyncPeer>>, BlockSyncError> {
        let local_difficulty = self.db.current_total_difficulty()?;
        let mut best: Option<(Arc<SyncPeer>, Difficulty)> = None;
        for peer in self.peers.snapshot().await {
            let difficulty = peer.difficulty().await;
            let is_better = best.as_ref().map(|(_, d)| difficulty > *d).unwrap_or(true);
            if is_better {
                best = Some((peer, difficulty));
            }
        }
        Ok(best.and_then(|(peer, difficulty)| (difficulty > local_difficulty).then_some(peer)))
    }

    /// Downloads and writes the peer's chain from the fork point up to the peer's advertised height, following the
    /// peer if it advances while syncing.
    #[tracing::instrument(skip(self, peer), fields(peer = %peer.peer_id()), err)]
    pub async fn bulk_sync_with_peer(&self, peer: &SyncPeer) -> Result<(), BlockSyncError> {
        let client = peer.client().as_ref();
        let (ancestor, fork) = find_common_ancestor(&*self.db, client, &peer.status().await).await?;
        info!(
            target: LOG_TARGET,
            "Starting bulk sync with {} from common ancestor #{}",
            peer,
            ancestor.number
        );

        let mut position = ancestor;
        let mut expected_first = Some(fork.hash());
        let mut last_target = None;
        loop {
            let target = peer.number().await;
            if last_target == Some(target) {
                break;
            }
            last_target = Some(target);

            while position.number < target {
                let mut skeleton = Skeleton::new(self.config.skeleton_span, self.config.skeleton_num_checkpoints);
                skeleton.build(client, &position).await?;
                skeleton.fill(client).await?;
                let last = skeleton.last_header().cloned();

                for slot in skeleton.into_slots() {
                    let blocks = slot.blocks();
                    let Some(first) = blocks.first() else {
                        continue;
                    };
                    if let Some(fork_hash) = expected_first.take() {
                        if first.hash() != fork_hash {
                            return Err(BlockSyncError::ProtocolViolation(format!(
                                "First synced block `{}` is not the fork block `{}`",
                                first.hash(),
                                fork_hash
                            )));
                        }
                    }
                    self.db.write_blocks(blocks).map_err(BlockSyncError::WriteFailure)?;
                    debug!(
                        target: LOG_TARGET,
                        "Wrote blocks #{} to #{} from {}",
                        first.number(),
                        first.number() + blocks.len() as u64 - 1,
                        peer
                    );
                }

                position = last.ok_or_else(|| {
                    BlockSyncError::ProtocolViolation(format!(
                        "Peer advertised #{} but sent no blocks after #{}",
                        target, position.number
                    ))
                })?;
            }
        }

        info!(
            target: LOG_TARGET,
            "Bulk sync with {} complete at #{}",
            peer,
            position.number
        );
        Ok(())
    }

    /// Applies blocks broadcast by the peer until the handler returns true or the peer goes away.
    ///
    /// Returns `Ok` when the peer's connection is found closed or the handler asks to stop, and an error if waiting
    /// for a block times out, the connection drops while waiting, or a block cannot be written.
    pub async fn watch_sync_with_peer<F>(&self, peer: &SyncPeer, mut handler: F) -> Result<(), BlockSyncError>
    where F: FnMut(&Block) -> bool {
        let head = self.db.header()?;
        let num_purged = peer.purge_blocks(&head.hash()).await;
        debug!(
            target: LOG_TARGET,
            "Watching {} from #{}, purged {} queued block(s)",
            peer,
            head.number,
            num_purged
        );

        loop {
            if peer.is_closed() {
                debug!(target: LOG_TARGET, "{} closed, stopping relay", peer);
                return Ok(());
            }
            let block = peer.pop_block(self.config.pop_timeout).await?;
            self.apply_relayed_block(&block)?;
            if handler(&block) {
                return Ok(());
            }
        }
    }

    fn apply_relayed_block(&self, block: &Block) -> Result<(), BlockSyncError> {
        let parent = block.parent_hash();
        if self.db.get_header_by_hash(parent)?.is_none() {
            return Err(BlockSyncError::RelayGap {
                number: block.number(),
                parent: *parent,
            });
        }
        self.db
            .write_blocks(std::slice::from_ref(block))
            .map_err(BlockSyncError::WriteFailure)?;
        trace!(target: LOG_TARGET, "Applied relayed block #{} `{}`", block.number(), block.hash());
        Ok(())
    }

    /// Bulk syncs with the peer, then relays its broadcast blocks
    pub async fn sync_with_peer<F>(&self, peer: &SyncPeer, handler: F) -> Result<(), BlockSyncError>
    where F: FnMut(&Block) -> bool {
        match self.bulk_sync_with_peer(peer).await {
            Ok(()) => {},
            // Already in sync with the peer's chain
            Err(BlockSyncError::ForkNotFound(_)) => {},
            Err(err) => return Err(err),
        }
        self.watch_sync_with_peer(peer, handler).await
    }
}

fn local_status<B: Blockchain + ?Sized>(db: &B) -> Result<Status, BlockSyncError> {
    let header: BlockHeader = db.header()?;
    let difficulty = match db.get_total_difficulty(&header.hash())? {
        Some(difficulty) => difficulty,
        None => db.current_total_difficulty()?,
    };
    Ok(Status::from_header(&header, difficulty))
}

async fn fetch_status(client: &dyn SyncRpcClient) -> Result<Status, BlockSyncError> {
    let status = client.get_current_status().await?;
    Status::try_from(status).map_err(BlockSyncError::DecodeFailure)
}
