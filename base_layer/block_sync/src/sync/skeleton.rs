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

//! Skeleton bulk download.
//!
//! A skeleton is a sparse set of control point headers `anchor, anchor + span, ..., anchor + num * span` requested
//! from a peer in a single round trip. Each pair of consecutive control points delimits a slot which is then filled
//! with the full blocks between them. Slots are fetched concurrently and handed back in ascending order.

use futures::future::try_join_all;
use log::*;

use super::{chain_split::decode_headers, rpc::SyncRpcClient, BlockSyncError};
use crate::{
    blocks::{Block, BlockHash, BlockHeader},
    proto::{get_headers_request::Start, GetBlocksRequest, GetHeadersRequest},
};

const LOG_TARGET: &str = "r::bn::block_sync::skeleton";

/// The blocks in `(start, end]`. An open slot (no `end`) takes whatever the peer has after `start`, up to one span.
#[derive(Debug, Clone)]
pub struct SkeletonSlot {
    start: BlockHeader,
    end: Option<BlockHeader>,
    blocks: Vec<Block>,
}

impl SkeletonSlot {
    pub fn start(&self) -> &BlockHeader {
        &self.start
    }

    pub fn end(&self) -> Option<&BlockHeader> {
        self.end.as_ref()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_filled(&self) -> bool {
        !self.blocks.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Skeleton {
    span: u64,
    num: u64,
    slots: Vec<SkeletonSlot>,
}

impl Skeleton {
    pub fn new(span: u64, num: u64) -> Self {
        Self {
            span,
            num,
            slots: Vec::new(),
        }
    }

    pub fn slots(&self) -> &[SkeletonSlot] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<SkeletonSlot> {
        self.slots
    }

    /// Header of the last block fetched by [fill](Self::fill)
    pub fn last_header(&self) -> Option<&BlockHeader> {
        self.slots
            .iter()
            .rev()
            .find_map(|slot| slot.blocks.last())
            .map(|block| &block.header)
    }

    /// Requests the control points from the peer, starting at `anchor`, which both chains already contain.
    pub async fn build(&mut self, client: &dyn SyncRpcClient, anchor: &BlockHeader) -> Result<(), BlockSyncError> {
        let anchor_hash = anchor.hash();
        let resp = client
            .get_headers(GetHeadersRequest {
                start: Some(Start::Hash(anchor_hash.to_string())),
                skip: self.span.saturating_sub(1),
                amount: self.num + 1,
            })
            .await?;
        let control_points = decode_headers(resp)?;
        let num_control_points = control_points.len() as u64;

        match control_points.first() {
            Some(first) if first.hash() == anchor_hash => {},
            Some(first) => {
                return Err(BlockSyncError::ProtocolViolation(format!(
                    "Skeleton starts at `{}` but was requested from `{}`",
                    first.hash(),
                    anchor_hash
                )));
            },
            None => {
                return Err(BlockSyncError::ProtocolViolation(format!(
                    "Peer does not have skeleton anchor #{} `{}`",
                    anchor.number, anchor_hash
                )));
            },
        }
        if num_control_points > self.num + 1 {
            return Err(BlockSyncError::ProtocolViolation(format!(
                "Peer sent {} control points, {} were requested",
                num_control_points,
                self.num + 1
            )));
        }
        for pair in control_points.windows(2) {
            if pair[1].number != pair[0].number + self.span {
                return Err(BlockSyncError::ProtocolViolation(format!(
                    "Control point #{} does not follow #{} by {} blocks",
                    pair[1].number, pair[0].number, self.span
                )));
            }
        }

        let mut slots = control_points
            .windows(2)
            .map(|pair| SkeletonSlot {
                start: pair[0].clone(),
                end: Some(pair[1].clone()),
                blocks: Vec::new(),
            })
            .collect::<Vec<_>>();
        // Fewer control points than requested means the peer's tip lies less than one span past the last one
        if num_control_points < self.num + 1 {
            if let Some(last) = control_points.last() {
                slots.push(SkeletonSlot {
                    start: last.clone(),
                    end: None,
                    blocks: Vec::new(),
                });
            }
        }
        debug!(
            target: LOG_TARGET,
            "Built skeleton from #{} with {} control point(s) and {} slot(s)",
            anchor.number,
            num_control_points,
            slots.len()
        );
        self.slots = slots;
        Ok(())
    }

    /// Fetches the blocks of every slot from the peer
    pub async fn fill(&mut self, client: &dyn SyncRpcClient) -> Result<(), BlockSyncError> {
        let span = self.span;
        let filled = try_join_all(self.slots.iter().map(|slot| fetch_slot(client, slot, span))).await?;
        for (slot, blocks) in self.slots.iter_mut().zip(filled) {
            slot.blocks = blocks;
        }
        Ok(())
    }
}

async fn fetch_slot(client: &dyn SyncRpcClient, slot: &SkeletonSlot, span: u64) -> Result<Vec<Block>, BlockSyncError> {
    let amount = match &slot.end {
        Some(end) => end.number - slot.start.number + 1,
        None => span + 1,
    };
    let resp = client
        .get_headers(GetHeadersRequest {
            start: Some(Start::Hash(slot.start.hash().to_string())),
            skip: 0,
            amount,
        })
        .await?;
    let headers = decode_headers(resp)?;

    let mut expected_parent = slot.start.hash();
    let mut hashes = Vec::with_capacity(headers.len());
    for header in headers.iter().skip(1) {
        if header.parent_hash != expected_parent {
            return Err(BlockSyncError::ChainLinkBroken {
                expected: expected_parent,
                actual: header.parent_hash,
            });
        }
        expected_parent = header.hash();
        hashes.push(expected_parent);
    }
    if let Some(end) = &slot.end {
        let end_hash = end.hash();
        if hashes.last() != Some(&end_hash) {
            return Err(BlockSyncError::ProtocolViolation(format!(
                "Slot ({}, {}] did not end at control point `{}`",
                slot.start.number, end.number, end_hash
            )));
        }
    }
    if hashes.is_empty() {
        return Ok(Vec::new());
    }

    let resp = client
        .get_blocks(GetBlocksRequest {
            hashes: hashes.iter().map(BlockHash::to_string).collect(),
        })
        .await?;
    if resp.blocks.len() != hashes.len() {
        return Err(BlockSyncError::ProtocolViolation(format!(
            "Requested {} blocks but peer sent {}",
            hashes.len(),
            resp.blocks.len()
        )));
    }
    let blocks = resp
        .blocks
        .iter()
        .zip(&hashes)
        .map(|(bytes, hash)| {
            let block = Block::from_bytes(bytes).map_err(|err| BlockSyncError::DecodeFailure(err.to_string()))?;
            if block.hash() != *hash {
                return Err(BlockSyncError::ProtocolViolation(format!(
                    "Requested block `{}` but peer sent `{}`",
                    hash,
                    block.hash()
                )));
            }
            Ok(block)
        })
        .collect::<Result<Vec<_>, _>>()?;
    trace!(
        target: LOG_TARGET,
        "Filled slot from #{} with {} block(s)",
        slot.start.number,
        blocks.len()
    );
    Ok(blocks)
}
