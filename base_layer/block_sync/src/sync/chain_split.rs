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

use std::cmp;

use log::*;

use super::{rpc::SyncRpcClient, BlockSyncError, Status};
use crate::{
    blocks::BlockHeader,
    chain_storage::Blockchain,
    proto::{get_headers_request::Start, GetHeadersRequest, GetHeadersResponse},
};

const LOG_TARGET: &str = "r::bn::block_sync::chain_split";

/// Binary searches for the highest block the local chain and the peer agree on.
///
/// Returns the common ancestor (a local header) and the peer's header directly above it, which is where the two
/// chains fork.
pub async fn find_common_ancestor<B: Blockchain + ?Sized>(
    db: &B,
    client: &dyn SyncRpcClient,
    peer_status: &Status,
) -> Result<(BlockHeader, BlockHeader), BlockSyncError> {
    let local_genesis = db
        .get_header_by_number(0)?
        .ok_or(BlockSyncError::LocalGenesisUnavailable)?;
    let local_height = db.header()?.number;

    let mut min = 0u64;
    let mut max = cmp::min(local_height, peer_status.number);
    let mut ancestor = None;
    let mut round_trips = 0usize;
    while min <= max {
        let m = min + (max - min) / 2;
        round_trips += 1;
        if m == 0 {
            match get_header_by_number(client, 0).await? {
                Some(remote) if remote.hash() == local_genesis.hash() => ancestor = Some(local_genesis.clone()),
                Some(remote) => {
                    return Err(BlockSyncError::GenesisMismatch {
                        local: local_genesis.hash(),
                        remote: remote.hash(),
                    });
                },
                None => {},
            }
            break;
        }

        match get_header_by_number(client, m).await? {
            None => max = m - 1,
            Some(remote) => {
                let local = db
                    .get_header_by_number(m)?
                    .ok_or(BlockSyncError::LocalHeaderNotFound(m))?;
                if local.hash() == remote.hash() {
                    ancestor = Some(local);
                    min = m + 1;
                } else {
                    max = m - 1;
                }
            },
        }
    }

    let ancestor = ancestor.ok_or(BlockSyncError::CommonAncestorNotFound)?;
    let fork = get_header_by_number(client, ancestor.number + 1)
        .await?
        .ok_or(BlockSyncError::ForkNotFound(ancestor.number))?;
    if fork.parent_hash != ancestor.hash() {
        return Err(BlockSyncError::ChainLinkBroken {
            expected: ancestor.hash(),
            actual: fork.parent_hash,
        });
    }
    debug!(
        target: LOG_TARGET,
        "Found common ancestor #{} `{}` after {} round trip(s), fork at `{}`",
        ancestor.number,
        ancestor.hash(),
        round_trips,
        fork.hash()
    );
    Ok((ancestor, fork))
}

/// Requests a single header by number. `None` means the peer does not have it.
pub async fn get_header_by_number(
    client: &dyn SyncRpcClient,
    number: u64,
) -> Result<Option<BlockHeader>, BlockSyncError> {
    let resp = client
        .get_headers(GetHeadersRequest {
            start: Some(Start::Number(number)),
            skip: 0,
            amount: 1,
        })
        .await?;
    let mut headers = decode_headers(resp)?;
    match headers.len() {
        0 => Ok(None),
        1 => {
            let header = headers.remove(0);
            if header.number != number {
                return Err(BlockSyncError::ProtocolViolation(format!(
                    "Requested header #{} but peer sent #{}",
                    number, header.number
                )));
            }
            Ok(Some(header))
        },
        n => Err(BlockSyncError::UnexpectedMultipleResults(n)),
    }
}

pub(super) fn decode_headers(resp: GetHeadersResponse) -> Result<Vec<BlockHeader>, BlockSyncError> {
    resp.headers
        .iter()
        .map(|bytes| BlockHeader::from_bytes(bytes).map_err(|err| BlockSyncError::DecodeFailure(err.to_string())))
        .collect()
}
