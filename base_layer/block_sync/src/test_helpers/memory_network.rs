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

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

use log::*;
use prost::Message;
use tokio::sync::broadcast;

use crate::{
    connectivity::{ConnectivityEvent, ConnectivityEventRx, SyncTransport},
    peer::PeerId,
    proto::{GetBlocksRequest, GetBlocksResponse, GetHeadersRequest, GetHeadersResponse, NotifyRequest, SyncStatus},
    rpc::{Request, Response, RpcError, RpcStatus},
    sync::rpc::{BlockSyncService, SyncRpcClient},
};

const LOG_TARGET: &str = "r::bn::block_sync::memory_network";

const EVENT_CHANNEL_SIZE: usize = 32;

struct Node {
    events: broadcast::Sender<Arc<ConnectivityEvent>>,
    services: HashMap<&'static str, Arc<dyn BlockSyncService>>,
}

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<PeerId, Node>,
    links: HashSet<(PeerId, PeerId)>,
}

/// An in-process network of nodes. RPC calls are dispatched directly to the remote node's registered service.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a node to the network and returns its transport
    pub fn add_node(&self, peer_id: PeerId) -> Arc<MemoryTransport> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        self.state().nodes.insert(peer_id, Node {
            events: events.clone(),
            services: HashMap::new(),
        });
        Arc::new(MemoryTransport {
            local: peer_id,
            network: self.clone(),
            events,
        })
    }

    /// Links two nodes and emits `PeerConnected` on both. Returns false if either node is unknown or they are
    /// already linked.
    pub fn connect(&self, a: &PeerId, b: &PeerId) -> bool {
        let mut state = self.state();
        if a == b || !state.nodes.contains_key(a) || !state.nodes.contains_key(b) {
            return false;
        }
        if !state.links.insert(link(a, b)) {
            return false;
        }
        debug!(target: LOG_TARGET, "Connected `{}` <-> `{}`", a.short_str(), b.short_str());
        emit(&state, a, ConnectivityEvent::PeerConnected(*b));
        emit(&state, b, ConnectivityEvent::PeerConnected(*a));
        true
    }

    /// Removes the link between two nodes and emits `PeerDisconnected` on both. Returns false if they were not linked.
    pub fn disconnect(&self, a: &PeerId, b: &PeerId) -> bool {
        let mut state = self.state();
        if !state.links.remove(&link(a, b)) {
            return false;
        }
        debug!(target: LOG_TARGET, "Disconnected `{}` <-> `{}`", a.short_str(), b.short_str());
        emit(&state, a, ConnectivityEvent::PeerDisconnected(*b));
        emit(&state, b, ConnectivityEvent::PeerDisconnected(*a));
        true
    }

    pub fn is_connected(&self, a: &PeerId, b: &PeerId) -> bool {
        self.state().links.contains(&link(a, b))
    }
}

fn link(a: &PeerId, b: &PeerId) -> (PeerId, PeerId) {
    if a <= b {
        (*a, *b)
    } else {
        (*b, *a)
    }
}

fn emit(state: &NetworkState, node: &PeerId, event: ConnectivityEvent) {
    if let Some(node) = state.nodes.get(node) {
        // No subscribers is fine
        let _result = node.events.send(Arc::new(event));
    }
}

/// A node's view of a [MemoryNetwork]
pub struct MemoryTransport {
    local: PeerId,
    network: MemoryNetwork,
    events: broadcast::Sender<Arc<ConnectivityEvent>>,
}

impl MemoryTransport {
    pub fn local_peer_id(&self) -> &PeerId {
        &self.local
    }
}

#[async_trait::async_trait]
impl SyncTransport for MemoryTransport {
    fn subscribe_events(&self) -> ConnectivityEventRx {
        self.events.subscribe()
    }

    fn register_protocol(&self, protocol: &'static str, service: Arc<dyn BlockSyncService>) {
        if let Some(node) = self.network.state().nodes.get_mut(&self.local) {
            node.services.insert(protocol, service);
        }
    }

    async fn connect_rpc(&self, peer: &PeerId, protocol: &'static str) -> Result<Arc<dyn SyncRpcClient>, RpcError> {
        let service = {
            let state = self.network.state();
            if !state.links.contains(&link(&self.local, peer)) {
                return Err(RpcError::PeerNotReachable(*peer));
            }
            state
                .nodes
                .get(peer)
                .and_then(|node| node.services.get(protocol))
                .cloned()
                .ok_or_else(|| RpcError::ProtocolServiceNotFound(protocol.to_string()))?
        };
        Ok(Arc::new(LoopbackRpcClient {
            local: self.local,
            remote: *peer,
            service,
            network: self.network.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Calls the remote node's service in-process, presenting the local node as the caller. Every request and response
/// passes through its wire encoding.
struct LoopbackRpcClient {
    local: PeerId,
    remote: PeerId,
    service: Arc<dyn BlockSyncService>,
    network: MemoryNetwork,
    closed: AtomicBool,
}

impl LoopbackRpcClient {
    fn request<T: Message + Default>(&self, message: &T) -> Result<Request<T>, RpcError> {
        if !self.is_connected() {
            return Err(RpcError::ClientClosed);
        }
        // Decoded by the remote end, so a malformed request fails there
        let message = T::decode(message.encode_to_vec().as_slice()).map_err(RpcStatus::from)?;
        Ok(Request::with_peer(self.local, message))
    }

    fn response<T: Message + Default>(response: Response<T>) -> Result<T, RpcError> {
        let bytes = response.into_message().encode_to_vec();
        trace!(target: LOG_TARGET, "Received {} byte response", bytes.len());
        Ok(T::decode(bytes.as_slice())?)
    }
}

#[async_trait::async_trait]
impl SyncRpcClient for LoopbackRpcClient {
    async fn get_current_status(&self) -> Result<SyncStatus, RpcError> {
        let resp = self.service.get_current_status(self.request(&())?).await?;
        Self::response(resp)
    }

    async fn get_headers(&self, request: GetHeadersRequest) -> Result<GetHeadersResponse, RpcError> {
        let resp = self.service.get_headers(self.request(&request)?).await?;
        Self::response(resp)
    }

    async fn get_blocks(&self, request: GetBlocksRequest) -> Result<GetBlocksResponse, RpcError> {
        let resp = self.service.get_blocks(self.request(&request)?).await?;
        Self::response(resp)
    }

    async fn notify(&self, request: NotifyRequest) -> Result<(), RpcError> {
        let resp = self.service.notify(self.request(&request)?).await?;
        Self::response(resp)
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.network.is_connected(&self.local, &self.remote)
    }

    async fn close(&self) -> Result<(), RpcError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
