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

use std::{
    collections::VecDeque,
    fmt,
    fmt::{Display, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use tokio::{
    sync::{Mutex, Notify, RwLock},
    time,
    time::Instant,
};

use super::{rpc::SyncRpcClient, BlockSyncError, Status};
use crate::{
    blocks::{Block, BlockHash, Difficulty},
    peer::PeerId,
};

const LOG_TARGET: &str = "r::bn::block_sync::sync_peer";

/// A connected peer: its RPC client, last advertised status and a bounded queue of blocks it has broadcast.
pub struct SyncPeer {
    peer_id: PeerId,
    client: Arc<dyn SyncRpcClient>,
    status: RwLock<Status>,
    queue: Mutex<VecDeque<Block>>,
    max_queue_size: usize,
    block_notify: Notify,
    closed: AtomicBool,
}

impl SyncPeer {
    pub fn new(peer_id: PeerId, client: Arc<dyn SyncRpcClient>, status: Status, max_queue_size: usize) -> Self {
        Self {
            peer_id,
            client,
            status: RwLock::new(status),
            queue: Mutex::new(VecDeque::with_capacity(max_queue_size)),
            max_queue_size,
            block_notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn client(&self) -> &Arc<dyn SyncRpcClient> {
        &self.client
    }

    pub async fn status(&self) -> Status {
        self.status.read().await.clone()
    }

    /// The peer's advertised chain height
    pub async fn number(&self) -> u64 {
        self.status.read().await.number
    }

    pub async fn difficulty(&self) -> Difficulty {
        self.status.read().await.difficulty
    }

    pub async fn update_status(&self, status: Status) {
        debug!(target: LOG_TARGET, "Peer `{}` status is now {}", self.peer_id.short_str(), status);
        *self.status.write().await = status;
    }

    /// Appends a broadcast block to the queue, evicting the oldest block when the queue is full
    pub async fn append_block(&self, block: Block) {
        if self.max_queue_size == 0 {
            trace!(
                target: LOG_TARGET,
                "Queueing is disabled, dropped block #{} from peer `{}`",
                block.number(),
                self.peer_id.short_str()
            );
            return;
        }
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.max_queue_size {
            if let Some(evicted) = queue.pop_front() {
                trace!(
                    target: LOG_TARGET,
                    "Queue for peer `{}` is full, dropped block #{}",
                    self.peer_id.short_str(),
                    evicted.number()
                );
            }
        }
        trace!(
            target: LOG_TARGET,
            "Queued block #{} from peer `{}`",
            block.number(),
            self.peer_id.short_str()
        );
        queue.push_back(block);
        drop(queue);
        self.block_notify.notify_one();
    }

    /// Removes and returns the oldest queued block, waiting up to `timeout` for one to arrive.
    pub async fn pop_block(&self, timeout: Duration) -> Result<Block, BlockSyncError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeups before inspecting the queue so that an append in between is not missed
            let notified = self.block_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return Err(BlockSyncError::ConnectionClosed);
            }
            if let Some(block) = self.queue.lock().await.pop_front() {
                return Ok(block);
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return Err(BlockSyncError::PopTimeout);
            }
        }
    }

    /// Drops every queued block up to and including the most recent block with the given hash. Returns the number of
    /// blocks removed.
    pub async fn purge_blocks(&self, last_seen: &BlockHash) -> usize {
        let mut queue = self.queue.lock().await;
        match queue.iter().rposition(|block| block.hash() == *last_seen) {
            Some(idx) => {
                queue.drain(..=idx);
                idx + 1
            },
            None => 0,
        }
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || !self.client.is_connected()
    }

    /// Closes the peer's connection and wakes any pending `pop_block` call
    pub async fn close(&self) -> Result<(), BlockSyncError> {
        self.closed.store(true, Ordering::SeqCst);
        self.block_notify.notify_waiters();
        self.queue.lock().await.clear();
        self.client.close().await?;
        Ok(())
    }
}

impl Display for SyncPeer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Peer `{}`", self.peer_id.short_str())
    }
}

impl fmt::Debug for SyncPeer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncPeer")
            .field("peer_id", &self.peer_id)
            .field("max_queue_size", &self.max_queue_size)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
