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

//! The node transport as seen by block sync: connection events plus per-peer RPC clients.

use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use tokio::sync::broadcast;

use crate::{
    peer::PeerId,
    rpc::RpcError,
    sync::rpc::{BlockSyncService, SyncRpcClient},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityEvent {
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
}

impl Display for ConnectivityEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityEvent::PeerConnected(peer) => write!(f, "PeerConnected({})", peer.short_str()),
            ConnectivityEvent::PeerDisconnected(peer) => write!(f, "PeerDisconnected({})", peer.short_str()),
        }
    }
}

pub type ConnectivityEventRx = broadcast::Receiver<Arc<ConnectivityEvent>>;

#[async_trait::async_trait]
pub trait SyncTransport: Send + Sync + 'static {
    /// Subscribes to peer connect/disconnect events
    fn subscribe_events(&self) -> ConnectivityEventRx;

    /// Makes `service` reachable by remote peers under `protocol`
    fn register_protocol(&self, protocol: &'static str, service: Arc<dyn BlockSyncService>);

    /// Opens an RPC session with a connected peer
    async fn connect_rpc(&self, peer: &PeerId, protocol: &'static str) -> Result<Arc<dyn SyncRpcClient>, RpcError>;
}
