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

//! Block synchronisation.
//!
//! [Syncer] owns the peer registry and the local chain status. Each connected peer is represented by a [SyncPeer]
//! which buffers the blocks the peer broadcasts. Catching up with a peer happens in two phases:
//!
//! 1. bulk sync: [find_common_ancestor] locates the fork point, then [Skeleton] batches download the peer's chain up
//!    to its advertised height
//! 2. live relay: blocks the peer broadcasts are popped from its queue and written one at a time

mod chain_split;
pub use chain_split::{find_common_ancestor, get_header_by_number};

mod error;
pub use error::BlockSyncError;

mod peer_registry;
pub use peer_registry::PeerRegistry;

pub mod rpc;

mod skeleton;
pub use skeleton::{Skeleton, SkeletonSlot};

mod status;
pub use status::Status;

mod sync_peer;
pub use sync_peer::SyncPeer;

mod syncer;
pub use syncer::Syncer;

#[cfg(test)]
mod test;
