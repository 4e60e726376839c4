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

use std::{convert::TryFrom, sync::Arc};

use log::*;

use super::BlockSyncService;
use crate::{
    blocks::{Block, BlockHash, BlockHeader},
    chain_storage::Blockchain,
    proto::{
        get_headers_request::Start,
        GetBlocksRequest,
        GetBlocksResponse,
        GetHeadersRequest,
        GetHeadersResponse,
        NotifyRequest,
        SyncStatus,
    },
    rpc::{Request, Response, RpcStatus},
    sync::{Status, Syncer},
};

const LOG_TARGET: &str = "r::bn::block_sync::rpc";

/// Serves this node's chain and receives block broadcasts from peers.
pub struct BlockSyncRpcService<B> {
    syncer: Arc<Syncer<B>>,
}

impl<B: Blockchain> BlockSyncRpcService<B> {
    pub fn new(syncer: Arc<Syncer<B>>) -> Self {
        Self { syncer }
    }

    #[inline]
    fn db(&self) -> &B {
        self.syncer.db()
    }
}

#[async_trait::async_trait]
impl<B: Blockchain> BlockSyncService for BlockSyncRpcService<B> {
    async fn get_current_status(&self, _request: Request<()>) -> Result<Response<SyncStatus>, RpcStatus> {
        let status = self.syncer.status().await;
        Ok(Response::new(status.into()))
    }

    async fn get_headers(&self, request: Request<GetHeadersRequest>) -> Result<Response<GetHeadersResponse>, RpcStatus> {
        let message = request.into_message();
        let headers = fetch_headers(self.db(), &message, self.syncer.config().max_headers_per_request)?;
        debug!(
            target: LOG_TARGET,
            "Serving {} header(s) for {:?} (skip: {}, amount: {})",
            headers.len(),
            message.start,
            message.skip,
            message.amount
        );
        let headers = headers
            .iter()
            .map(BlockHeader::to_bytes)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RpcStatus::log_internal_error(LOG_TARGET))?;
        Ok(Response::new(GetHeadersResponse { headers }))
    }

    async fn get_blocks(&self, request: Request<GetBlocksRequest>) -> Result<Response<GetBlocksResponse>, RpcStatus> {
        let message = request.into_message();
        let blocks = fetch_blocks(self.db(), &message, self.syncer.config().max_blocks_per_request)?;
        let blocks = blocks
            .iter()
            .map(Block::to_bytes)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RpcStatus::log_internal_error(LOG_TARGET))?;
        Ok(Response::new(GetBlocksResponse { blocks }))
    }

    async fn notify(&self, request: Request<NotifyRequest>) -> Result<Response<()>, RpcStatus> {
        let (peer_id, message) = request.into_parts();
        let peer_id = peer_id.ok_or_else(|| RpcStatus::bad_request("Notify requires a peer"))?;
        let status = message
            .status
            .ok_or_else(|| RpcStatus::bad_request("Notify status is missing"))?;
        let status = Status::try_from(status).map_err(RpcStatus::bad_request)?;
        let block = Block::from_bytes(&message.block).map_err(|err| RpcStatus::bad_request(err.to_string()))?;

        if !self.syncer.update_peer_status(&peer_id, status).await {
            debug!(
                target: LOG_TARGET,
                "Ignoring block #{} from unregistered peer `{}`",
                block.number(),
                peer_id.short_str()
            );
            return Ok(Response::new(()));
        }
        self.syncer.enqueue_block(&peer_id, block).await;
        Ok(Response::new(()))
    }
}

/// Canonical headers starting at the requested block. An unknown or non-canonical start yields no headers.
pub fn fetch_headers<B: Blockchain + ?Sized>(
    db: &B,
    request: &GetHeadersRequest,
    max_headers: u64,
) -> Result<Vec<BlockHeader>, RpcStatus> {
    let start = match &request.start {
        Some(Start::Number(number)) => *number,
        Some(Start::Hash(hash)) => {
            let hash = hash
                .parse::<BlockHash>()
                .map_err(|err| RpcStatus::bad_request(err.to_string()))?;
            let is_canonical = db
                .is_canonical(&hash)
                .map_err(RpcStatus::log_internal_error(LOG_TARGET))?;
            let header = db
                .get_header_by_hash(&hash)
                .map_err(RpcStatus::log_internal_error(LOG_TARGET))?;
            match header {
                Some(header) if is_canonical => header.number,
                _ => return Ok(Vec::new()),
            }
        },
        None => return Err(RpcStatus::bad_request("Start block is missing")),
    };

    let amount = request.amount.clamp(1, max_headers.max(1));
    let step = request.skip.saturating_add(1);
    let mut headers = Vec::new();
    let mut number = start;
    for _ in 0..amount {
        match db
            .get_header_by_number(number)
            .map_err(RpcStatus::log_internal_error(LOG_TARGET))?
        {
            Some(header) => headers.push(header),
            None => break,
        }
        number = match number.checked_add(step) {
            Some(n) => n,
            None => break,
        };
    }
    Ok(headers)
}

/// Blocks for the requested hashes, in request order, stopping at the first unknown hash
pub fn fetch_blocks<B: Blockchain + ?Sized>(
    db: &B,
    request: &GetBlocksRequest,
    max_blocks: usize,
) -> Result<Vec<Block>, RpcStatus> {
    let mut blocks = Vec::with_capacity(request.hashes.len().min(max_blocks));
    for hash in request.hashes.iter().take(max_blocks) {
        let hash = hash
            .parse::<BlockHash>()
            .map_err(|err| RpcStatus::bad_request(err.to_string()))?;
        match db
            .get_block_by_hash(&hash)
            .map_err(RpcStatus::log_internal_error(LOG_TARGET))?
        {
            Some(block) => blocks.push(block),
            None => break,
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        chain_storage::MemoryBlockchain,
        config::BlockSyncConfig,
        peer::PeerId,
        rpc::RpcStatusCode,
        test_helpers::{create_chain, create_fork, create_genesis, MockSyncRpcClient},
    };

    fn setup(height: u64) -> (BlockSyncRpcService<MemoryBlockchain>, Arc<Syncer<MemoryBlockchain>>, Vec<Block>) {
        let genesis = create_genesis();
        let mut chain = vec![genesis.clone()];
        chain.extend(create_chain(&genesis, height, 0));
        let db = MemoryBlockchain::new(genesis);
        db.write_blocks(&chain[1..]).unwrap();
        let syncer = Arc::new(Syncer::new(BlockSyncConfig::default(), Arc::new(db)).unwrap());
        (BlockSyncRpcService::new(syncer.clone()), syncer, chain)
    }

    fn headers_request(start: Start, skip: u64, amount: u64) -> Request<GetHeadersRequest> {
        Request::new(GetHeadersRequest {
            start: Some(start),
            skip,
            amount,
        })
    }

    fn decode(resp: Response<GetHeadersResponse>) -> Vec<u64> {
        resp.into_message()
            .headers
            .iter()
            .map(|b| BlockHeader::from_bytes(b).unwrap().number)
            .collect()
    }

    #[tokio::test]
    async fn it_returns_the_current_status() {
        let (service, _, chain) = setup(5);
        let status = service.get_current_status(Request::new(())).await.unwrap().into_message();
        let status = Status::try_from(status).unwrap();
        assert_eq!(status.number, 5);
        assert_eq!(status.hash, chain[5].hash());
        assert_eq!(status.difficulty, 6u64.into());
    }

    #[tokio::test]
    async fn get_headers_by_number_and_hash() {
        let (service, _, chain) = setup(30);
        let resp = service.get_headers(headers_request(Start::Number(3), 0, 1)).await.unwrap();
        assert_eq!(decode(resp), vec![3]);

        let resp = service
            .get_headers(headers_request(Start::Hash(chain[0].hash().to_string()), 9, 6))
            .await
            .unwrap();
        assert_eq!(decode(resp), vec![0, 10, 20, 30]);

        // Zero amount is treated as one
        let resp = service.get_headers(headers_request(Start::Number(7), 0, 0)).await.unwrap();
        assert_eq!(decode(resp), vec![7]);
    }

    #[tokio::test]
    async fn get_headers_for_unknown_blocks_is_empty() {
        let (service, _, chain) = setup(10);
        let resp = service.get_headers(headers_request(Start::Number(11), 0, 1)).await.unwrap();
        assert!(decode(resp).is_empty());

        let fork = create_fork(&chain[10], 1, 1);
        let resp = service
            .get_headers(headers_request(Start::Hash(fork[0].hash().to_string()), 0, 1))
            .await
            .unwrap();
        assert!(decode(resp).is_empty());

        let err = service
            .get_headers(headers_request(Start::Hash("0x1234".to_string()), 0, 1))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), RpcStatusCode::BadRequest);
    }

    #[tokio::test]
    async fn get_headers_is_capped() {
        let (service, _, _) = setup(300);
        let resp = service.get_headers(headers_request(Start::Number(0), 0, 1000)).await.unwrap();
        assert_eq!(decode(resp).len(), 190);
    }

    #[tokio::test]
    async fn get_blocks_stops_at_the_first_unknown_hash() {
        let (service, _, chain) = setup(10);
        let unknown = create_fork(&chain[10], 1, 1);
        let hashes = vec![chain[1].hash(), chain[2].hash(), unknown[0].hash(), chain[3].hash()];
        let resp = service
            .get_blocks(Request::new(GetBlocksRequest {
                hashes: hashes.iter().map(ToString::to_string).collect(),
            }))
            .await
            .unwrap()
            .into_message();
        let blocks = resp
            .blocks
            .iter()
            .map(|b| Block::from_bytes(b).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(blocks, chain[1..3].to_vec());
    }

    #[tokio::test]
    async fn notify_queues_the_block_for_a_registered_peer() {
        let (service, syncer, chain) = setup(3);
        let peer_id = PeerId::random();
        let remote = MockSyncRpcClient::new(Status::from_header(&chain[3].header, 4u64.into()));
        syncer.handle_new_peer(peer_id, Arc::new(remote)).await.unwrap();

        let next = create_chain(&chain[3], 1, 0).remove(0);
        let status = Status::from_header(&next.header, 5u64.into());
        service
            .notify(Request::with_peer(peer_id, NotifyRequest {
                status: Some(status.clone().into()),
                block: next.to_bytes().unwrap(),
            }))
            .await
            .unwrap();

        let peer = syncer.peer(&peer_id).await.unwrap();
        assert_eq!(peer.status().await, status);
        assert_eq!(peer.queue_len().await, 1);
    }

    #[tokio::test]
    async fn notify_requires_a_registered_peer() {
        let (service, syncer, chain) = setup(3);
        let msg = NotifyRequest {
            status: Some(Status::from_header(&chain[3].header, 4u64.into()).into()),
            block: chain[3].to_bytes().unwrap(),
        };
        let err = service.notify(Request::new(msg.clone())).await.unwrap_err();
        assert_eq!(err.status_code(), RpcStatusCode::BadRequest);

        service
            .notify(Request::with_peer(PeerId::random(), msg.clone()))
            .await
            .unwrap();
        assert_eq!(syncer.num_peers().await, 0);

        let err = service
            .notify(Request::with_peer(PeerId::random(), NotifyRequest {
                block: vec![1, 2, 3],
                ..msg
            }))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), RpcStatusCode::BadRequest);
    }
}
