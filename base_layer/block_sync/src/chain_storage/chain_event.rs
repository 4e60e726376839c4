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

use std::fmt::{self, Display, Formatter};

use crate::blocks::{BlockHeader, Difficulty};

/// Chain change notifications published by a [Blockchain](super::Blockchain).
///
/// Every header list is ordered newest first, so the first entry of `new_chain` is the new tip.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEvent {
    /// Blocks were appended to the canonical chain. `difficulty` is the total difficulty of the new tip.
    NewChainHead {
        new_chain: Vec<BlockHeader>,
        difficulty: Difficulty,
    },
    /// The canonical chain switched branches.
    Reorg {
        new_chain: Vec<BlockHeader>,
        old_chain: Vec<BlockHeader>,
        difficulty: Difficulty,
    },
    /// Blocks were stored on a side chain that does not (yet) carry the most work.
    Fork {
        headers: Vec<BlockHeader>,
        difficulty: Difficulty,
    },
}

impl ChainEvent {
    /// Returns the new canonical tip if this event moved it
    pub fn new_tip(&self) -> Option<(&BlockHeader, &Difficulty)> {
        match self {
            ChainEvent::NewChainHead { new_chain, difficulty } | ChainEvent::Reorg { new_chain, difficulty, .. } => {
                new_chain.first().map(|header| (header, difficulty))
            },
            ChainEvent::Fork { .. } => None,
        }
    }
}

impl Display for ChainEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChainEvent::NewChainHead { new_chain, difficulty } => {
                write!(f, "NewChainHead({} block(s), td {})", new_chain.len(), difficulty)
            },
            ChainEvent::Reorg {
                new_chain,
                old_chain,
                difficulty,
            } => write!(
                f,
                "Reorg({} added, {} removed, td {})",
                new_chain.len(),
                old_chain.len(),
                difficulty
            ),
            ChainEvent::Fork { headers, difficulty } => write!(f, "Fork({} block(s), td {})", headers.len(), difficulty),
        }
    }
}
