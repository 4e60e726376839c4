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

//! Block synchronisation core for a Ridge node.
//!
//! Keeps the local chain up to date with network peers:
//! * tracks the local chain status and every connected peer's advertised status
//! * finds where a peer's chain diverges from the local chain
//! * bulk-fetches missing history in skeleton batches
//! * relays newly broadcast blocks into the local chain once caught up
//!
//! The chain store, the transport and consensus are collaborators consumed through the
//! [Blockchain](chain_storage::Blockchain) and [SyncTransport](connectivity::SyncTransport) traits.

pub mod blocks;
pub mod chain_storage;
pub mod config;
pub mod connectivity;
pub mod peer;
pub mod proto;
pub mod rpc;
pub mod sync;

#[cfg(any(test, feature = "test-mocks"))]
pub mod test_helpers;

pub use config::BlockSyncConfig;
pub use sync::{BlockSyncError, Status, SyncPeer, Syncer};
