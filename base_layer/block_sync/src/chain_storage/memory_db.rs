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

//! A memory-backed chain store. All data is lost when the process ends, so this is intended for tests and for
//! nodes that do not persist their chain.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::*;
use tokio::sync::broadcast;

use super::{Blockchain, ChainEvent, ChainStorageError};
use crate::blocks::{Block, BlockHash, BlockHeader, Difficulty};

const LOG_TARGET: &str = "r::bn::chain_storage::memory_db";
const EVENT_CHANNEL_CAPACITY: usize = 100;

struct StoredBlock {
    block: Block,
    total_difficulty: Difficulty,
}

struct InnerDatabase {
    /// Canonical chain, indexed by block number
    canonical: Vec<BlockHash>,
    blocks: HashMap<BlockHash, StoredBlock>,
}

impl InnerDatabase {
    fn tip(&self) -> Result<&StoredBlock, ChainStorageError> {
        self.canonical
            .last()
            .and_then(|hash| self.blocks.get(hash))
            .ok_or_else(|| ChainStorageError::AccessError("canonical chain is empty".to_string()))
    }

    fn is_canonical(&self, header: &BlockHeader, hash: &BlockHash) -> bool {
        usize::try_from(header.number)
            .ok()
            .and_then(|n| self.canonical.get(n))
            .map(|h| h == hash)
            .unwrap_or(false)
    }

    fn canonical_header(&self, number: u64) -> Option<&BlockHeader> {
        let hash = self.canonical.get(usize::try_from(number).ok()?)?;
        self.blocks.get(hash).map(|stored| &stored.block.header)
    }

    /// Makes `tip` the canonical tip, returning the headers that were added and removed (both newest first)
    fn set_canonical_tip(&mut self, tip: BlockHash) -> Result<(Vec<BlockHeader>, Vec<BlockHeader>), ChainStorageError> {
        let mut added = Vec::new();
        let mut cursor = tip;
        loop {
            let stored = self.blocks.get(&cursor).ok_or_else(|| ChainStorageError::ValueNotFound {
                entity: "block",
                field: "hash",
                value: cursor.to_string(),
            })?;
            let header = &stored.block.header;
            if self.is_canonical(header, &cursor) {
                break;
            }
            added.push(header.clone());
            cursor = header.parent_hash;
        }
        let split = added
            .last()
            .map(|h| h.number)
            .ok_or_else(|| ChainStorageError::InvalidOperation("new tip is already canonical".to_string()))?;
        let split = usize::try_from(split).map_err(|e| ChainStorageError::InvalidOperation(e.to_string()))?;

        let removed = self.canonical.split_off(split);
        let removed = removed
            .iter()
            .rev()
            .filter_map(|hash| self.blocks.get(hash).map(|stored| stored.block.header.clone()))
            .collect();
        self.canonical.extend(added.iter().rev().map(|h| h.hash()));
        Ok((added, removed))
    }
}

/// A memory-backed chain store. A single lock protects the whole database, heaviest total difficulty wins.
#[derive(Clone)]
pub struct MemoryBlockchain {
    db: Arc<RwLock<InnerDatabase>>,
    event_publisher: broadcast::Sender<Arc<ChainEvent>>,
}

impl MemoryBlockchain {
    pub fn new(genesis: Block) -> Self {
        let hash = genesis.hash();
        let total_difficulty = Difficulty::from(genesis.header.difficulty);
        let mut blocks = HashMap::new();
        blocks.insert(hash, StoredBlock {
            block: genesis,
            total_difficulty,
        });
        let (event_publisher, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db: Arc::new(RwLock::new(InnerDatabase {
                canonical: vec![hash],
                blocks,
            })),
            event_publisher,
        }
    }

    /// Publishes an event to all subscribers without touching the stored chain
    pub fn publish_event(&self, event: ChainEvent) {
        let _result = self.event_publisher.send(Arc::new(event));
    }

    pub fn height(&self) -> Result<u64, ChainStorageError> {
        Ok(self.header()?.number)
    }

    fn db_read_access(&self) -> Result<RwLockReadGuard<'_, InnerDatabase>, ChainStorageError> {
        self.db
            .read()
            .map_err(|e| ChainStorageError::AccessError(e.to_string()))
    }

    fn db_write_access(&self) -> Result<RwLockWriteGuard<'_, InnerDatabase>, ChainStorageError> {
        self.db
            .write()
            .map_err(|e| ChainStorageError::AccessError(e.to_string()))
    }
}

impl Blockchain for MemoryBlockchain {
    fn header(&self) -> Result<BlockHeader, ChainStorageError> {
        Ok(self.db_read_access()?.tip()?.block.header.clone())
    }

    fn get_total_difficulty(&self, hash: &BlockHash) -> Result<Option<Difficulty>, ChainStorageError> {
        Ok(self
            .db_read_access()?
            .blocks
            .get(hash)
            .map(|stored| stored.total_difficulty))
    }

    fn current_total_difficulty(&self) -> Result<Difficulty, ChainStorageError> {
        Ok(self.db_read_access()?.tip()?.total_difficulty)
    }

    fn get_header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, ChainStorageError> {
        Ok(self.db_read_access()?.canonical_header(number).cloned())
    }

    fn get_header_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainStorageError> {
        Ok(self
            .db_read_access()?
            .blocks
            .get(hash)
            .map(|stored| stored.block.header.clone()))
    }

    fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, ChainStorageError> {
        Ok(self.db_read_access()?.blocks.get(hash).map(|stored| stored.block.clone()))
    }

    fn write_blocks(&self, blocks: &[Block]) -> Result<(), ChainStorageError> {
        let mut db = self.db_write_access()?;

        // Validate the whole batch before anything is stored
        let mut staged: Vec<(BlockHash, Block, Difficulty)> = Vec::with_capacity(blocks.len());
        for block in blocks {
            let hash = block.hash();
            if db.blocks.contains_key(&hash) || staged.iter().any(|(h, _, _)| *h == hash) {
                trace!(target: LOG_TARGET, "Block {} already stored", hash);
                continue;
            }
            let parent = block.parent_hash();
            let (parent_number, parent_td) = match staged.iter().find(|(h, _, _)| h == parent) {
                Some((_, b, td)) => (b.number(), *td),
                None => {
                    let stored = db.blocks.get(parent).ok_or_else(|| {
                        ChainStorageError::InvalidBlock(format!("Block {} has unknown parent {}", hash, parent))
                    })?;
                    (stored.block.number(), stored.total_difficulty)
                },
            };
            if block.number() != parent_number + 1 {
                return Err(ChainStorageError::InvalidBlock(format!(
                    "Block {} has number {} but its parent has number {}",
                    hash,
                    block.number(),
                    parent_number
                )));
            }
            let total_difficulty = parent_td
                .checked_add(Difficulty::from(block.header.difficulty))
                .ok_or_else(|| ChainStorageError::InvalidBlock(format!("Total difficulty overflow at block {}", hash)))?;
            staged.push((hash, block.clone(), total_difficulty));
        }

        if staged.is_empty() {
            return Ok(());
        }

        let mut best_td = db.tip()?.total_difficulty;
        let mut best_tip = None;
        let mut fork_headers = Vec::new();
        for (hash, block, total_difficulty) in staged {
            if total_difficulty > best_td {
                best_td = total_difficulty;
                best_tip = Some(hash);
            }
            fork_headers.push(block.header.clone());
            db.blocks.insert(hash, StoredBlock {
                block,
                total_difficulty,
            });
        }

        let event = match best_tip {
            Some(tip) => {
                let (new_chain, old_chain) = db.set_canonical_tip(tip)?;
                debug!(
                    target: LOG_TARGET,
                    "Canonical tip is now #{} `{}` ({} added, {} removed)",
                    new_chain.first().map(|h| h.number).unwrap_or_default(),
                    tip,
                    new_chain.len(),
                    old_chain.len()
                );
                if old_chain.is_empty() {
                    ChainEvent::NewChainHead {
                        new_chain,
                        difficulty: best_td,
                    }
                } else {
                    ChainEvent::Reorg {
                        new_chain,
                        old_chain,
                        difficulty: best_td,
                    }
                }
            },
            None => {
                fork_headers.reverse();
                let difficulty = fork_headers
                    .first()
                    .and_then(|h| db.blocks.get(&h.hash()))
                    .map(|stored| stored.total_difficulty)
                    .unwrap_or_default();
                ChainEvent::Fork {
                    headers: fork_headers,
                    difficulty,
                }
            },
        };
        drop(db);

        // Sending fails only when there are no subscribers
        let _result = self.event_publisher.send(Arc::new(event));
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<Arc<ChainEvent>> {
        self.event_publisher.subscribe()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::{create_chain, create_fork, create_genesis};

    #[test]
    fn it_appends_blocks_to_the_tip() {
        let genesis = create_genesis();
        let db = MemoryBlockchain::new(genesis.clone());
        let mut events = db.subscribe_events();
        let chain = create_chain(&genesis, 5, 0);
        db.write_blocks(&chain).unwrap();

        assert_eq!(db.height().unwrap(), 5);
        assert_eq!(db.current_total_difficulty().unwrap(), Difficulty::from(6u64));
        assert_eq!(db.get_header_by_number(3).unwrap().unwrap(), chain[2].header);
        let event = events.try_recv().unwrap();
        match &*event {
            ChainEvent::NewChainHead { new_chain, difficulty } => {
                assert_eq!(new_chain.len(), 5);
                assert_eq!(new_chain[0].number, 5);
                assert_eq!(*difficulty, Difficulty::from(6u64));
            },
            e => panic!("unexpected event {}", e),
        }
    }

    #[test]
    fn it_is_all_or_nothing() {
        let genesis = create_genesis();
        let db = MemoryBlockchain::new(genesis.clone());
        let mut chain = create_chain(&genesis, 4, 0);
        // Break the link between blocks 2 and 3
        chain.remove(2);
        assert!(db.write_blocks(&chain).is_err());
        assert_eq!(db.height().unwrap(), 0);
        assert!(db.get_block_by_hash(&chain[0].hash()).unwrap().is_none());
    }

    #[test]
    fn rewriting_stored_blocks_is_a_no_op() {
        let genesis = create_genesis();
        let db = MemoryBlockchain::new(genesis.clone());
        let chain = create_chain(&genesis, 3, 0);
        db.write_blocks(&chain).unwrap();
        let mut events = db.subscribe_events();
        db.write_blocks(&chain).unwrap();
        assert_eq!(db.height().unwrap(), 3);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn it_stores_lighter_branches_as_forks_and_reorgs_to_heavier_ones() {
        let genesis = create_genesis();
        let db = MemoryBlockchain::new(genesis.clone());
        let main = create_chain(&genesis, 10, 0);
        db.write_blocks(&main).unwrap();
        let mut events = db.subscribe_events();

        // Branch off block 6
        let fork = create_fork(&main[5], 2, 1);
        db.write_blocks(&fork).unwrap();
        assert_eq!(db.header().unwrap(), main[9].header);
        assert!(matches!(&*events.try_recv().unwrap(), ChainEvent::Fork { headers, .. } if headers.len() == 2));
        assert!(!db.is_canonical(&fork[0].hash()).unwrap());

        let fork = create_fork(&main[5], 6, 1);
        db.write_blocks(&fork[2..]).unwrap();
        assert_eq!(db.header().unwrap(), fork[5].header);
        assert!(db.is_canonical(&fork[0].hash()).unwrap());
        assert!(!db.is_canonical(&main[9].hash()).unwrap());
        match &*events.try_recv().unwrap() {
            ChainEvent::Reorg {
                new_chain, old_chain, ..
            } => {
                assert_eq!(new_chain.len(), 6);
                assert_eq!(new_chain[0], fork[5].header);
                assert_eq!(old_chain.len(), 4);
                assert_eq!(old_chain[0], main[9].header);
            },
            e => panic!("unexpected event {}", e),
        }
    }
}
