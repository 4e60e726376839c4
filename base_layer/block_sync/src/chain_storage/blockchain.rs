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

use std::sync::Arc;

use tokio::sync::broadcast;

use super::{ChainEvent, ChainStorageError};
use crate::blocks::{Block, BlockHash, BlockHeader, Difficulty};

/// The chain store as seen by block sync. Implementations serialise concurrent writers themselves.
pub trait Blockchain: Send + Sync + 'static {
    /// The header of the current canonical tip
    fn header(&self) -> Result<BlockHeader, ChainStorageError>;

    /// Total difficulty of the chain ending at `hash`, or `None` if the block is unknown
    fn get_total_difficulty(&self, hash: &BlockHash) -> Result<Option<Difficulty>, ChainStorageError>;

    /// Total difficulty of the canonical tip
    fn current_total_difficulty(&self) -> Result<Difficulty, ChainStorageError>;

    /// Canonical header at the given height
    fn get_header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, ChainStorageError>;

    /// Header of any stored block, canonical or not
    fn get_header_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainStorageError>;

    fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, ChainStorageError>;

    /// Writes the given blocks in order. Either every block is stored or none is.
    fn write_blocks(&self, blocks: &[Block]) -> Result<(), ChainStorageError>;

    fn subscribe_events(&self) -> broadcast::Receiver<Arc<ChainEvent>>;

    /// Returns true if the block is stored and part of the canonical chain
    fn is_canonical(&self, hash: &BlockHash) -> Result<bool, ChainStorageError> {
        match self.get_header_by_hash(hash)? {
            Some(header) => Ok(self
                .get_header_by_number(header.number)?
                .map(|h| h.hash() == *hash)
                .unwrap_or(false)),
            None => Ok(false),
        }
    }
}
