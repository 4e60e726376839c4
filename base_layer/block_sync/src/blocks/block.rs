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

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::{BlockError, BlockHash, BlockHeader};

/// A block is a header plus an opaque list of body entries. Body validation belongs to the chain's write path.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub body: Vec<Vec<u8>>,
}

impl Block {
    pub fn new(header: BlockHeader, body: Vec<Vec<u8>>) -> Self {
        Self { header, body }
    }

    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn parent_hash(&self) -> &BlockHash {
        &self.header.parent_hash
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BlockError> {
        borsh::to_vec(self).map_err(|source| BlockError::EncodeError { entity: "block", source })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockError> {
        Self::try_from_slice(bytes).map_err(|source| BlockError::DecodeError { entity: "block", source })
    }
}

impl From<BlockHeader> for Block {
    fn from(header: BlockHeader) -> Self {
        Self::new(header, Vec::new())
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} with {} body entries", self.header, self.body.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn block_hash_is_header_hash() {
        let block = Block::new(BlockHeader::new(1), vec![b"tx".to_vec()]);
        assert_eq!(block.hash(), block.header.hash());
        assert_eq!(block.number(), 0);
    }

    #[test]
    fn it_rejects_truncated_bytes() {
        let block = Block::new(BlockHeader::new(1), vec![vec![1, 2, 3]]);
        let bytes = block.to_bytes().unwrap();
        assert_eq!(Block::from_bytes(&bytes).unwrap(), block);
        assert!(Block::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
