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

//! Test helpers that are small and useful enough to be included in the main crate. Enabled for this crate's own
//! tests and for dependants through the `test-mocks` feature.

mod memory_network;
pub use memory_network::{MemoryNetwork, MemoryTransport};

mod mock_rpc_client;
pub use mock_rpc_client::MockSyncRpcClient;

use std::sync::Arc;

use crate::{
    blocks::{Block, BlockHeader, Difficulty},
    chain_storage::{Blockchain, MemoryBlockchain},
    peer::PeerId,
    sync::{Status, SyncPeer},
};

/// The genesis block shared by every chain built with these helpers
pub fn create_genesis() -> Block {
    Block::new(BlockHeader::new(1), Vec::new())
}

/// Builds `n` blocks on top of `parent`. The same parent and seed always produce the same blocks.
pub fn create_chain(parent: &Block, n: u64, seed: u64) -> Vec<Block> {
    build_on(parent, n, seed.to_le_bytes().to_vec())
}

/// Builds `n` blocks on top of `parent` that never coincide with blocks from [create_chain]
pub fn create_fork(parent: &Block, n: u64, seed: u64) -> Vec<Block> {
    let mut extra_data = b"fork".to_vec();
    extra_data.extend_from_slice(&seed.to_le_bytes());
    build_on(parent, n, extra_data)
}

fn build_on(parent: &Block, n: u64, extra_data: Vec<u8>) -> Vec<Block> {
    let mut prev = parent.header.clone();
    (0..n)
        .map(|_| {
            let mut header = BlockHeader::from_previous(&prev);
            header.extra_data = extra_data.clone();
            let block = Block::new(header.clone(), vec![header.number.to_le_bytes().to_vec()]);
            prev = header;
            block
        })
        .collect()
}

/// Creates a chain store holding `blocks`, where `blocks[0]` is the genesis block
pub fn create_blockchain(blocks: &[Block]) -> Arc<MemoryBlockchain> {
    let genesis = blocks.first().cloned().unwrap_or_else(create_genesis);
    let db = MemoryBlockchain::new(genesis);
    if blocks.len() > 1 {
        db.write_blocks(&blocks[1..]).expect("test chain must be valid");
    }
    Arc::new(db)
}

/// A peer handle backed by a [MockSyncRpcClient] advertising the given head
pub fn sync_peer_with_status(header: &BlockHeader, difficulty: Difficulty) -> (Arc<SyncPeer>, Arc<MockSyncRpcClient>) {
    let status = Status::from_header(header, difficulty);
    let client = Arc::new(MockSyncRpcClient::new(status.clone()));
    let peer = Arc::new(SyncPeer::new(PeerId::random(), client.clone(), status, 50));
    (peer, client)
}
