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

use std::{sync::Arc, time::Duration};

use ridge_shutdown::Shutdown;
use tokio::{task::JoinHandle, time};

use super::*;
use crate::{
    blocks::{Block, Difficulty},
    chain_storage::{Blockchain, ChainEvent, MemoryBlockchain},
    config::BlockSyncConfig,
    peer::PeerId,
    test_helpers::{
        create_blockchain,
        create_chain,
        create_fork,
        create_genesis,
        sync_peer_with_status,
        MemoryNetwork,
        MemoryTransport,
        MockSyncRpcClient,
    },
};

fn init_logging() {
    let _ = env_logger::try_init();
}

fn chain_of(height: u64) -> Vec<Block> {
    let genesis = create_genesis();
    let mut chain = vec![genesis.clone()];
    chain.extend(create_chain(&genesis, height, 0));
    chain
}

fn new_syncer(blocks: &[Block]) -> (Arc<Syncer<MemoryBlockchain>>, Arc<MemoryBlockchain>) {
    let db = create_blockchain(blocks);
    let syncer = Arc::new(Syncer::new(BlockSyncConfig::default(), db.clone()).unwrap());
    (syncer, db)
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

struct TestNode {
    peer_id: PeerId,
    syncer: Arc<Syncer<MemoryBlockchain>>,
    db: Arc<MemoryBlockchain>,
    _transport: Arc<MemoryTransport>,
    tasks: (JoinHandle<()>, JoinHandle<()>),
}

fn start_node(network: &MemoryNetwork, blocks: &[Block], shutdown: &Shutdown) -> TestNode {
    let peer_id = PeerId::random();
    let transport = network.add_node(peer_id);
    let (syncer, db) = new_syncer(blocks);
    let tasks = syncer.start(transport.clone(), shutdown.to_signal());
    TestNode {
        peer_id,
        syncer,
        db,
        _transport: transport,
        tasks,
    }
}

async fn connect(network: &MemoryNetwork, a: &TestNode, b: &TestNode) -> (Arc<SyncPeer>, Arc<SyncPeer>) {
    assert!(network.connect(&a.peer_id, &b.peer_id));
    let (syncer_a, syncer_b) = (&a.syncer, &b.syncer);
    let (id_a, id_b) = (&a.peer_id, &b.peer_id);
    wait_until(|| async move { syncer_a.peer(id_b).await.is_some() && syncer_b.peer(id_a).await.is_some() }).await;
    (
        a.syncer.peer(&b.peer_id).await.unwrap(),
        b.syncer.peer(&a.peer_id).await.unwrap(),
    )
}

mod best_peer {
    use super::*;

    async fn syncer_with_peers(local_td: u64, peer_tds: &[u64]) -> (Arc<Syncer<MemoryBlockchain>>, Vec<PeerId>) {
        let chain = chain_of(local_td - 1);
        let (syncer, _) = new_syncer(&chain);
        let mut ids = Vec::new();
        for td in peer_tds {
            let client = Arc::new(MockSyncRpcClient::new(Status::from_header(
                &chain[0].header,
                Difficulty::from(*td),
            )));
            let peer_id = PeerId::random();
            syncer.handle_new_peer(peer_id, client).await.unwrap();
            ids.push(peer_id);
        }
        (syncer, ids)
    }

    #[tokio::test]
    async fn it_picks_the_heaviest_peer_above_the_local_chain() {
        let (syncer, ids) = syncer_with_peers(10, &[5, 20]).await;
        let best = syncer.best_peer().await.unwrap().unwrap();
        assert_eq!(*best.peer_id(), ids[1]);
    }

    #[tokio::test]
    async fn it_returns_none_when_no_peer_is_heavier() {
        let (syncer, _) = syncer_with_peers(10, &[5, 8]).await;
        assert!(syncer.best_peer().await.unwrap().is_none());

        let (syncer, _) = syncer_with_peers(10, &[10]).await;
        assert!(syncer.best_peer().await.unwrap().is_none());

        let (syncer, _) = syncer_with_peers(10, &[]).await;
        assert!(syncer.best_peer().await.unwrap().is_none());
    }
}

mod peers {
    use super::*;

    #[tokio::test]
    async fn a_failed_status_request_registers_nothing() {
        let chain = chain_of(3);
        let (syncer, _) = new_syncer(&chain);
        let client = Arc::new(MockSyncRpcClient::new(Status::from_header(&chain[3].header, 4u64.into())));
        client.set_fail_requests(true);

        let err = syncer.handle_new_peer(PeerId::random(), client.clone()).await.unwrap_err();
        assert!(matches!(err, BlockSyncError::RpcError(_)));
        assert_eq!(syncer.num_peers().await, 0);
        assert_eq!(client.close_calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_deletes_close_the_peer_once() {
        let chain = chain_of(3);
        let (syncer, _) = new_syncer(&chain);
        let client = Arc::new(MockSyncRpcClient::new(Status::from_header(&chain[3].header, 4u64.into())));
        let peer_id = PeerId::random();
        syncer.handle_new_peer(peer_id, client.clone()).await.unwrap();

        let (a, b) = tokio::join!(syncer.delete_peer(&peer_id), syncer.delete_peer(&peer_id));
        a.unwrap();
        b.unwrap();
        assert_eq!(syncer.num_peers().await, 0);
        assert_eq!(client.close_calls(), 1);

        // Unknown peers are ignored
        syncer.delete_peer(&PeerId::random()).await.unwrap();
    }

    #[tokio::test]
    async fn reconnecting_replaces_and_closes_the_previous_session() {
        let chain = chain_of(3);
        let (syncer, _) = new_syncer(&chain);
        let status = Status::from_header(&chain[3].header, 4u64.into());
        let first = Arc::new(MockSyncRpcClient::new(status.clone()));
        let second = Arc::new(MockSyncRpcClient::new(status));
        let peer_id = PeerId::random();

        let old = syncer.handle_new_peer(peer_id, first.clone()).await.unwrap();
        syncer.handle_new_peer(peer_id, second.clone()).await.unwrap();
        assert_eq!(syncer.num_peers().await, 1);
        assert!(old.is_closed());
        assert_eq!(first.close_calls(), 1);
        assert_eq!(second.close_calls(), 0);
    }

    #[tokio::test]
    async fn an_invalid_config_is_rejected() {
        let db = create_blockchain(&chain_of(3));
        let config = BlockSyncConfig {
            max_queued_blocks: 0,
            ..Default::default()
        };
        let err = Syncer::new(config, db).err().unwrap();
        assert!(matches!(err, BlockSyncError::InvalidConfig(ref e) if e.field() == "max_queued_blocks"));
    }

    #[tokio::test]
    async fn closed_sessions_are_swept() {
        let chain = chain_of(3);
        let (syncer, _) = new_syncer(&chain);
        let status = Status::from_header(&chain[3].header, 4u64.into());
        let live = Arc::new(MockSyncRpcClient::new(status.clone()));
        let dropped = Arc::new(MockSyncRpcClient::new(status));
        let live_id = PeerId::random();
        syncer.handle_new_peer(live_id, live.clone()).await.unwrap();
        syncer.handle_new_peer(PeerId::random(), dropped.clone()).await.unwrap();

        assert_eq!(syncer.remove_closed_peers().await, 0);
        // The connection went away without a disconnect event
        dropped.set_connected(false);
        assert_eq!(syncer.remove_closed_peers().await, 1);
        assert_eq!(syncer.num_peers().await, 1);
        assert!(syncer.peer(&live_id).await.is_some());
        assert_eq!(dropped.close_calls(), 1);
        assert_eq!(live.close_calls(), 0);
    }

    #[tokio::test]
    async fn broadcast_skips_failing_peers() {
        init_logging();
        let chain = chain_of(5);
        let (syncer, _) = new_syncer(&chain);
        let status = Status::from_header(&chain[5].header, 6u64.into());
        let good = Arc::new(MockSyncRpcClient::new(status.clone()));
        let bad = Arc::new(MockSyncRpcClient::new(status));
        syncer.handle_new_peer(PeerId::random(), good.clone()).await.unwrap();
        syncer.handle_new_peer(PeerId::random(), bad.clone()).await.unwrap();
        bad.set_fail_requests(true);

        let num_notified = syncer.broadcast(&chain[5]).await.unwrap();
        assert_eq!(num_notified, 1);
        assert_eq!(good.notified_blocks(), vec![chain[5].clone()]);
        assert!(bad.notifications().is_empty());

        let notification = good.notifications().remove(0);
        let status = Status::try_from(notification.status.unwrap()).unwrap();
        assert_eq!(status, Status::from_header(&chain[5].header, 6u64.into()));
    }
}

mod status_tracker {
    use super::*;

    #[tokio::test]
    async fn it_follows_the_canonical_tip() {
        init_logging();
        let chain = chain_of(5);
        let (syncer, db) = new_syncer(&chain);
        let mut shutdown = Shutdown::new();
        let tracker = syncer.spawn_status_tracker(shutdown.to_signal());
        let s = &syncer;

        let next = create_chain(&chain[5], 3, 0);
        db.write_blocks(&next).unwrap();
        wait_until(|| async move { s.status().await.number == 8 }).await;
        assert_eq!(syncer.status().await, Status::from_header(&next[2].header, 9u64.into()));

        // A heavier fork from block 4 reorgs the chain
        let fork = create_fork(&chain[4], 6, 1);
        db.write_blocks(&fork).unwrap();
        wait_until(|| async move { s.status().await.number == 10 }).await;
        assert_eq!(syncer.status().await.hash, fork[5].hash());
        assert_eq!(syncer.status().await.difficulty, Difficulty::from(11u64));

        shutdown.trigger();
        time::timeout(Duration::from_secs(5), tracker).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn it_ignores_fork_events() {
        let chain = chain_of(5);
        let (syncer, db) = new_syncer(&chain);
        let mut shutdown = Shutdown::new();
        let tracker = syncer.spawn_status_tracker(shutdown.to_signal());
        let before = syncer.status().await;

        let fork = create_fork(&chain[1], 2, 1);
        db.publish_event(ChainEvent::Fork {
            headers: fork.iter().rev().map(|b| b.header.clone()).collect(),
            difficulty: 4u64.into(),
        });
        // Followed by a head change so that we know the fork event was handled
        let next = create_chain(&chain[5], 1, 0);
        db.write_blocks(&next).unwrap();
        let s = &syncer;
        wait_until(|| async move { s.status().await.number == 6 }).await;
        assert_ne!(syncer.status().await, before);
        assert_eq!(syncer.status().await.hash, next[0].hash());

        shutdown.trigger();
        time::timeout(Duration::from_secs(5), tracker).await.unwrap().unwrap();
    }
}

mod watch_sync {
    use super::*;

    fn setup(height: u64) -> (Arc<Syncer<MemoryBlockchain>>, Arc<MemoryBlockchain>, Vec<Block>) {
        let chain = chain_of(height);
        let (syncer, db) = new_syncer(&chain);
        (syncer, db, chain)
    }

    #[tokio::test]
    async fn it_applies_relayed_blocks_until_the_handler_stops() {
        let (syncer, db, chain) = setup(5);
        let (peer, _) = sync_peer_with_status(&chain[5].header, 6u64.into());
        // Stale broadcasts the local chain already has
        for block in &chain[3..] {
            peer.append_block(block.clone()).await;
        }
        let next = create_chain(&chain[5], 3, 0);
        for block in &next {
            peer.append_block(block.clone()).await;
        }

        let mut seen = Vec::new();
        syncer
            .watch_sync_with_peer(&peer, |block| {
                seen.push(block.number());
                block.number() == 7
            })
            .await
            .unwrap();
        assert_eq!(seen, vec![6, 7]);
        assert_eq!(db.header().unwrap(), next[1].header);
        assert_eq!(peer.queue_len().await, 1);
    }

    #[tokio::test]
    async fn a_block_with_an_unknown_parent_is_a_gap() {
        let (syncer, db, chain) = setup(5);
        let (peer, _) = sync_peer_with_status(&chain[5].header, 6u64.into());
        let next = create_chain(&chain[5], 2, 0);
        peer.append_block(next[1].clone()).await;

        let err = syncer.watch_sync_with_peer(&peer, |_| false).await.unwrap_err();
        assert!(matches!(err, BlockSyncError::RelayGap { number: 7, .. }));
        assert_eq!(db.height().unwrap(), 5);
    }

    #[tokio::test]
    async fn a_closed_peer_ends_the_watch() {
        let (syncer, _, chain) = setup(5);
        let (peer, client) = sync_peer_with_status(&chain[5].header, 6u64.into());
        client.set_connected(false);
        syncer.watch_sync_with_peer(&peer, |_| false).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn a_silent_peer_times_out() {
        let (syncer, _, chain) = setup(5);
        let (peer, _) = sync_peer_with_status(&chain[5].header, 6u64.into());
        let err = syncer.watch_sync_with_peer(&peer, |_| false).await.unwrap_err();
        assert!(matches!(err, BlockSyncError::PopTimeout));
    }
}

mod bulk_sync {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use tokio::sync::broadcast;

    use super::*;
    use crate::{
        blocks::{BlockHash, BlockHeader},
        chain_storage::ChainStorageError,
        proto::{GetBlocksRequest, GetBlocksResponse, GetHeadersRequest, GetHeadersResponse, NotifyRequest, SyncStatus},
        rpc::RpcError,
        sync::rpc::SyncRpcClient,
    };

    /// Serves a remote chain that grows by `growth` after the first block request, raising the peer's advertised
    /// status accordingly
    struct GrowingChainClient {
        inner: MockSyncRpcClient,
        remote: Arc<MemoryBlockchain>,
        growth: Mutex<Option<Vec<Block>>>,
        syncer: Mutex<Option<(Arc<Syncer<MemoryBlockchain>>, PeerId)>>,
    }

    #[async_trait::async_trait]
    impl SyncRpcClient for GrowingChainClient {
        async fn get_current_status(&self) -> Result<SyncStatus, RpcError> {
            self.inner.get_current_status().await
        }

        async fn get_headers(&self, request: GetHeadersRequest) -> Result<GetHeadersResponse, RpcError> {
            self.inner.get_headers(request).await
        }

        async fn get_blocks(&self, request: GetBlocksRequest) -> Result<GetBlocksResponse, RpcError> {
            let resp = self.inner.get_blocks(request).await?;
            let growth = self.growth.lock().unwrap().take();
            if let Some(blocks) = growth {
                self.remote.write_blocks(&blocks).unwrap();
                let status = Status::from_header(
                    &self.remote.header().unwrap(),
                    self.remote.current_total_difficulty().unwrap(),
                );
                self.inner.set_status(status.clone());
                let registered = self.syncer.lock().unwrap().take();
                let (syncer, peer_id) = registered.unwrap();
                assert!(syncer.update_peer_status(&peer_id, status).await);
            }
            Ok(resp)
        }

        async fn notify(&self, request: NotifyRequest) -> Result<(), RpcError> {
            self.inner.notify(request).await
        }

        fn is_connected(&self) -> bool {
            self.inner.is_connected()
        }

        async fn close(&self) -> Result<(), RpcError> {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn it_follows_a_peer_that_advances_mid_sync() {
        init_logging();
        let remote_chain = chain_of(40);
        let remote = create_blockchain(&remote_chain);
        let growth = create_chain(&remote_chain[40], 25, 0);
        let client = Arc::new(GrowingChainClient {
            inner: MockSyncRpcClient::with_chain(remote.clone()),
            remote,
            growth: Mutex::new(Some(growth.clone())),
            syncer: Mutex::new(None),
        });
        let (syncer, db) = new_syncer(&remote_chain[..=0]);
        let peer_id = PeerId::random();
        let peer = syncer.handle_new_peer(peer_id, client.clone()).await.unwrap();
        assert_eq!(peer.number().await, 40);
        *client.syncer.lock().unwrap() = Some((syncer.clone(), peer_id));

        syncer.bulk_sync_with_peer(&peer).await.unwrap();
        assert_eq!(peer.number().await, 65);
        assert_eq!(db.height().unwrap(), 65);
        assert_eq!(db.header().unwrap(), growth[24].header);
    }

    /// A chain store whose `fail_on`th write (1-based) fails
    struct FailingWrites {
        db: Arc<MemoryBlockchain>,
        num_writes: AtomicUsize,
        fail_on: usize,
    }

    impl Blockchain for FailingWrites {
        fn header(&self) -> Result<BlockHeader, ChainStorageError> {
            self.db.header()
        }

        fn get_total_difficulty(&self, hash: &BlockHash) -> Result<Option<Difficulty>, ChainStorageError> {
            self.db.get_total_difficulty(hash)
        }

        fn current_total_difficulty(&self) -> Result<Difficulty, ChainStorageError> {
            self.db.current_total_difficulty()
        }

        fn get_header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, ChainStorageError> {
            self.db.get_header_by_number(number)
        }

        fn get_header_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainStorageError> {
            self.db.get_header_by_hash(hash)
        }

        fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, ChainStorageError> {
            self.db.get_block_by_hash(hash)
        }

        fn write_blocks(&self, blocks: &[Block]) -> Result<(), ChainStorageError> {
            if self.num_writes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(ChainStorageError::AccessError("disk full".to_string()));
            }
            self.db.write_blocks(blocks)
        }

        fn subscribe_events(&self) -> broadcast::Receiver<Arc<ChainEvent>> {
            self.db.subscribe_events()
        }
    }

    #[tokio::test]
    async fn a_failed_write_aborts_the_sync() {
        let remote_chain = chain_of(40);
        let client = Arc::new(MockSyncRpcClient::with_chain(create_blockchain(&remote_chain)));
        let db = create_blockchain(&remote_chain[..=0]);
        let local = Arc::new(FailingWrites {
            db: db.clone(),
            num_writes: AtomicUsize::new(0),
            fail_on: 3,
        });
        let syncer = Syncer::new(BlockSyncConfig::default(), local.clone()).unwrap();
        let peer = syncer.handle_new_peer(PeerId::random(), client).await.unwrap();

        let err = syncer.bulk_sync_with_peer(&peer).await.unwrap_err();
        assert!(matches!(err, BlockSyncError::WriteFailure(ChainStorageError::AccessError(_))));
        // Two slots of ten blocks were written before the failing one
        assert_eq!(local.num_writes.load(Ordering::SeqCst), 3);
        assert_eq!(db.height().unwrap(), 20);
        assert!(db.get_header_by_hash(&remote_chain[21].hash()).unwrap().is_none());
    }
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn connectivity_events_register_and_remove_peers() {
        init_logging();
        let network = MemoryNetwork::new();
        let shutdown = Shutdown::new();
        let chain = chain_of(3);
        let a = start_node(&network, &chain, &shutdown);
        let b = start_node(&network, &chain, &shutdown);

        let (b_at_a, _) = connect(&network, &a, &b).await;
        assert_eq!(b_at_a.status().await, b.syncer.status().await);

        assert!(network.disconnect(&a.peer_id, &b.peer_id));
        let (syncer_a, syncer_b) = (&a.syncer, &b.syncer);
        wait_until(|| async move { syncer_a.num_peers().await == 0 && syncer_b.num_peers().await == 0 }).await;
        assert!(b_at_a.is_closed());
    }

    #[tokio::test]
    async fn it_bulk_syncs_a_longer_chain() {
        init_logging();
        let network = MemoryNetwork::new();
        let shutdown = Shutdown::new();
        let remote_chain = chain_of(57);
        let a = start_node(&network, &remote_chain[..=10], &shutdown);
        let b = start_node(&network, &remote_chain, &shutdown);

        let (b_at_a, _) = connect(&network, &a, &b).await;
        let best = a.syncer.best_peer().await.unwrap().unwrap();
        assert_eq!(*best.peer_id(), b.peer_id);

        a.syncer.bulk_sync_with_peer(&b_at_a).await.unwrap();
        assert_eq!(a.db.header().unwrap(), remote_chain[57].header);
        let (syncer_a, syncer_b) = (&a.syncer, &b.syncer);
        wait_until(|| async move { syncer_a.status().await == syncer_b.status().await }).await;
        assert!(a.syncer.best_peer().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn it_reorgs_onto_a_heavier_fork() {
        init_logging();
        let network = MemoryNetwork::new();
        let shutdown = Shutdown::new();
        let local_chain = chain_of(30);
        let mut remote_chain = local_chain[..=20].to_vec();
        remote_chain.extend(create_fork(&local_chain[20], 40, 1));
        let a = start_node(&network, &local_chain, &shutdown);
        let b = start_node(&network, &remote_chain, &shutdown);

        let (b_at_a, _) = connect(&network, &a, &b).await;
        a.syncer.bulk_sync_with_peer(&b_at_a).await.unwrap();
        assert_eq!(a.db.header().unwrap(), remote_chain[60].header);
        assert_eq!(a.db.current_total_difficulty().unwrap(), Difficulty::from(61u64));
        // The abandoned branch is still stored
        assert!(a.db.get_header_by_hash(&local_chain[30].hash()).unwrap().is_some());
    }

    #[tokio::test]
    async fn a_peer_that_is_in_sync_has_nothing_to_bulk_sync() {
        let network = MemoryNetwork::new();
        let shutdown = Shutdown::new();
        let chain = chain_of(12);
        let a = start_node(&network, &chain, &shutdown);
        let b = start_node(&network, &chain, &shutdown);

        let (b_at_a, _) = connect(&network, &a, &b).await;
        let err = a.syncer.bulk_sync_with_peer(&b_at_a).await.unwrap_err();
        assert!(matches!(err, BlockSyncError::ForkNotFound(12)));
    }

    #[tokio::test]
    async fn it_syncs_then_relays_broadcast_blocks() {
        init_logging();
        let network = MemoryNetwork::new();
        let mut shutdown = Shutdown::new();
        let mut remote_chain = chain_of(25);
        let a = start_node(&network, &remote_chain[..=2], &shutdown);
        let b = start_node(&network, &remote_chain, &shutdown);

        let (b_at_a, _) = connect(&network, &a, &b).await;
        let sync_task = {
            let syncer = a.syncer.clone();
            tokio::spawn(async move { syncer.sync_with_peer(&b_at_a, |block| block.number() == 27).await })
        };

        let db_a = &a.db;
        wait_until(|| async move { db_a.height().unwrap() == 25 }).await;
        for _ in 0..2 {
            let tip = remote_chain.last().cloned().unwrap();
            let next = create_chain(&tip, 1, 0).remove(0);
            b.db.write_blocks(std::slice::from_ref(&next)).unwrap();
            assert_eq!(b.syncer.broadcast(&next).await.unwrap(), 1);
            remote_chain.push(next);
        }

        time::timeout(Duration::from_secs(5), sync_task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(a.db.header().unwrap(), remote_chain[27].header);
        let b_at_a = a.syncer.peer(&b.peer_id).await.unwrap();
        assert_eq!(b_at_a.number().await, 27);

        shutdown.trigger();
        for node in [a, b] {
            let (tracker, connectivity) = node.tasks;
            tracker.await.unwrap();
            connectivity.await.unwrap();
        }
    }
}
