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

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};

use crate::{
    blocks::Block,
    chain_storage::Blockchain,
    config::BlockSyncConfig,
    proto::{GetBlocksRequest, GetBlocksResponse, GetHeadersRequest, GetHeadersResponse, NotifyRequest, SyncStatus},
    rpc::{RpcError, RpcStatus},
    sync::{
        rpc::{fetch_blocks, fetch_headers, SyncRpcClient},
        Status,
    },
};

struct MockState {
    status: Status,
    notifications: Vec<NotifyRequest>,
    header_response_override: Option<GetHeadersResponse>,
}

/// A scripted [SyncRpcClient]. Headers and blocks are served from an optional chain store.
pub struct MockSyncRpcClient {
    state: Mutex<MockState>,
    chain: Option<Arc<dyn Blockchain>>,
    connected: AtomicBool,
    fail_requests: AtomicBool,
    close_calls: AtomicUsize,
}

impl MockSyncRpcClient {
    pub fn new(status: Status) -> Self {
        Self {
            state: Mutex::new(MockState {
                status,
                notifications: Vec::new(),
                header_response_override: None,
            }),
            chain: None,
            connected: AtomicBool::new(true),
            fail_requests: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// A client serving the given chain and advertising its current head
    pub fn with_chain<B: Blockchain>(chain: Arc<B>) -> Self {
        let header = chain.header().expect("chain head must be readable");
        let difficulty = chain
            .current_total_difficulty()
            .expect("chain difficulty must be readable");
        let mut client = Self::new(Status::from_header(&header, difficulty));
        client.chain = Some(chain);
        client
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> Status {
        self.state().status.clone()
    }

    pub fn set_status(&self, status: Status) {
        self.state().status = status;
    }

    /// Every notification received, oldest first
    pub fn notifications(&self) -> Vec<NotifyRequest> {
        self.state().notifications.clone()
    }

    /// Decoded blocks of every notification received
    pub fn notified_blocks(&self) -> Vec<Block> {
        self.state()
            .notifications
            .iter()
            .filter_map(|n| Block::from_bytes(&n.block).ok())
            .collect()
    }

    /// Responds to every header request with `resp` instead of serving the chain
    pub fn set_header_response_override(&self, resp: Option<GetHeadersResponse>) {
        self.state().header_response_override = resp;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes every request fail with a general error
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn check_request(&self) -> Result<(), RpcError> {
        if !self.is_connected() {
            return Err(RpcError::ClientClosed);
        }
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(RpcStatus::general("mock request failure").into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SyncRpcClient for MockSyncRpcClient {
    async fn get_current_status(&self) -> Result<SyncStatus, RpcError> {
        self.check_request()?;
        Ok(self.status().into())
    }

    async fn get_headers(&self, request: GetHeadersRequest) -> Result<GetHeadersResponse, RpcError> {
        self.check_request()?;
        if let Some(resp) = self.state().header_response_override.clone() {
            return Ok(resp);
        }
        let headers = match &self.chain {
            Some(chain) => fetch_headers(&**chain, &request, BlockSyncConfig::default().max_headers_per_request)?,
            None => Vec::new(),
        };
        let headers = headers
            .iter()
            .map(|h| h.to_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(RpcError::client_internal_error)?;
        Ok(GetHeadersResponse { headers })
    }

    async fn get_blocks(&self, request: GetBlocksRequest) -> Result<GetBlocksResponse, RpcError> {
        self.check_request()?;
        let blocks = match &self.chain {
            Some(chain) => fetch_blocks(&**chain, &request, BlockSyncConfig::default().max_blocks_per_request)?,
            None => Vec::new(),
        };
        let blocks = blocks
            .iter()
            .map(|b| b.to_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(RpcError::client_internal_error)?;
        Ok(GetBlocksResponse { blocks })
    }

    async fn notify(&self, request: NotifyRequest) -> Result<(), RpcError> {
        self.check_request()?;
        self.state().notifications.push(request);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), RpcError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
