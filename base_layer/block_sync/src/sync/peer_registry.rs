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

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use super::SyncPeer;
use crate::peer::PeerId;

/// The set of currently connected sync peers.
///
/// Entries are only reachable through this type, so removing a peer and closing it cannot race with another caller
/// obtaining the same entry.
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<PeerId, Arc<SyncPeer>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts the peer, returning the handle it replaced (if any)
    pub async fn insert(&self, peer: Arc<SyncPeer>) -> Option<Arc<SyncPeer>> {
        self.peers.write().await.insert(*peer.peer_id(), peer)
    }

    /// Removes and returns the peer. Only one of any number of concurrent callers receives the handle.
    pub async fn remove(&self, peer_id: &PeerId) -> Option<Arc<SyncPeer>> {
        self.peers.write().await.remove(peer_id)
    }

    /// Removes and returns every peer whose connection is closed
    pub async fn remove_closed(&self) -> Vec<Arc<SyncPeer>> {
        let mut peers = self.peers.write().await;
        let closed = peers
            .values()
            .filter(|peer| peer.is_closed())
            .map(|peer| *peer.peer_id())
            .collect::<Vec<_>>();
        closed.iter().filter_map(|peer_id| peers.remove(peer_id)).collect()
    }

    pub async fn get(&self, peer_id: &PeerId) -> Option<Arc<SyncPeer>> {
        self.peers.read().await.get(peer_id).cloned()
    }

    /// Returns the handles registered at the time of the call
    pub async fn snapshot(&self) -> Vec<Arc<SyncPeer>> {
        self.peers.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
