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

mod service;
#[cfg(any(test, feature = "test-mocks"))]
pub(crate) use service::{fetch_blocks, fetch_headers};
pub use service::BlockSyncRpcService;

use crate::{
    proto::{GetBlocksRequest, GetBlocksResponse, GetHeadersRequest, GetHeadersResponse, NotifyRequest, SyncStatus},
    rpc::{Request, Response, RpcError, RpcStatus},
};

/// Versioned protocol name the sync service is registered under
pub const BLOCK_SYNC_PROTOCOL: &str = "/syncer/0.1";

/// The block sync service a node exposes to its peers.
#[async_trait::async_trait]
pub trait BlockSyncService: Send + Sync + 'static {
    async fn get_current_status(&self, request: Request<()>) -> Result<Response<SyncStatus>, RpcStatus>;

    async fn get_headers(&self, request: Request<GetHeadersRequest>) -> Result<Response<GetHeadersResponse>, RpcStatus>;

    async fn get_blocks(&self, request: Request<GetBlocksRequest>) -> Result<Response<GetBlocksResponse>, RpcStatus>;

    async fn notify(&self, request: Request<NotifyRequest>) -> Result<Response<()>, RpcStatus>;
}

/// Client side of a [BlockSyncService] session with a single peer.
#[async_trait::async_trait]
pub trait SyncRpcClient: Send + Sync + 'static {
    async fn get_current_status(&self) -> Result<SyncStatus, RpcError>;

    async fn get_headers(&self, request: GetHeadersRequest) -> Result<GetHeadersResponse, RpcError>;

    async fn get_blocks(&self, request: GetBlocksRequest) -> Result<GetBlocksResponse, RpcError>;

    async fn notify(&self, request: NotifyRequest) -> Result<(), RpcError>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<(), RpcError>;
}
