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

use crate::{
    blocks::{BlockError, BlockHash},
    chain_storage::ChainStorageError,
    config::ConfigurationError,
    rpc::{RpcError, RpcStatus},
};

#[derive(Debug, thiserror::Error)]
pub enum BlockSyncError {
    #[error("Local genesis header is not available")]
    LocalGenesisUnavailable,
    #[error("Peer genesis `{remote}` does not match local genesis `{local}`")]
    GenesisMismatch { local: BlockHash, remote: BlockHash },
    #[error("No common ancestor found with peer")]
    CommonAncestorNotFound,
    #[error("Peer has no block above common ancestor #{0}")]
    ForkNotFound(u64),
    #[error("Timed out waiting for a block from the peer")]
    PopTimeout,
    #[error("Peer connection is closed")]
    ConnectionClosed,
    #[error("Failed to decode peer message: {0}")]
    DecodeFailure(String),
    #[error("Failed to write blocks to the chain: {0}")]
    WriteFailure(ChainStorageError),
    #[error("Peer returned {0} headers for a single header request")]
    UnexpectedMultipleResults(usize),
    #[error("Local header #{0} not found")]
    LocalHeaderNotFound(u64),
    #[error("RPC error: {0}")]
    RpcError(#[from] RpcError),
    #[error("Chain storage error: {0}")]
    ChainStorageError(#[from] ChainStorageError),
    #[error("Peer protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Blocks did not form a chain. Expected parent `{expected}`, got `{actual}`")]
    ChainLinkBroken { expected: BlockHash, actual: BlockHash },
    #[error("Relayed block #{number} has unknown parent `{parent}`, the chain must be resynced")]
    RelayGap { number: u64, parent: BlockHash },
    #[error("Block error: {0}")]
    BlockError(#[from] BlockError),
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(#[from] ConfigurationError),
}

impl BlockSyncError {
    /// Returns true if the peer can never be synced with, e.g. because it follows a different network
    pub fn is_permanent_for_peer(&self) -> bool {
        matches!(self, BlockSyncError::GenesisMismatch { .. })
    }
}

impl From<RpcStatus> for BlockSyncError {
    fn from(status: RpcStatus) -> Self {
        BlockSyncError::RpcError(status.into())
    }
}
