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

use blake2::{digest::consts::U32, Blake2b, Digest};
use borsh::{BorshDeserialize, BorshSerialize};

use super::{BlockError, BlockHash, BLOCK_HASH_DOMAIN};

type HeaderHasher = Blake2b<U32>;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    /// Version of the block
    pub version: u16,
    /// Height of this block since the genesis block (height 0)
    pub number: u64,
    /// Hash of the block previous to this in the chain.
    pub parent_hash: BlockHash,
    /// Timestamp at which the block was built, in seconds since the unix epoch
    pub timestamp: u64,
    /// Difficulty contributed by this block alone. The chain's total difficulty is accumulated by the chain store.
    pub difficulty: u64,
    /// Opaque producer data
    pub extra_data: Vec<u8>,
}

impl BlockHeader {
    pub fn new(version: u16) -> Self {
        Self {
            version,
            number: 0,
            parent_hash: BlockHash::zero(),
            timestamp: 0,
            difficulty: 1,
            extra_data: Vec::new(),
        }
    }

    /// Create a new block header using relevant data from the previous block. The height is incremented by one, the
    /// parent hash is set and the timestamp advances by one second. Difficulty is carried over.
    pub fn from_previous(prev: &BlockHeader) -> BlockHeader {
        BlockHeader {
            version: prev.version,
            number: prev.number + 1,
            parent_hash: prev.hash(),
            timestamp: prev.timestamp + 1,
            difficulty: prev.difficulty,
            extra_data: Vec::new(),
        }
    }

    pub fn hash(&self) -> BlockHash {
        let digest = HeaderHasher::new()
            .chain_update(BLOCK_HASH_DOMAIN)
            .chain_update(self.version.to_le_bytes())
            .chain_update(self.number.to_le_bytes())
            .chain_update(self.parent_hash.as_bytes())
            .chain_update(self.timestamp.to_le_bytes())
            .chain_update(self.difficulty.to_le_bytes())
            .chain_update((self.extra_data.len() as u64).to_le_bytes())
            .chain_update(&self.extra_data)
            .finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        BlockHash::new(hash)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BlockError> {
        borsh::to_vec(self).map_err(|source| BlockError::EncodeError {
            entity: "block header",
            source,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockError> {
        Self::try_from_slice(bytes).map_err(|source| BlockError::DecodeError {
            entity: "block header",
            source,
        })
    }
}

impl Display for BlockHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} `{}` (parent: `{}`, difficulty: {})",
            self.number,
            self.hash(),
            self.parent_hash,
            self.difficulty
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_previous() {
        let h1 = BlockHeader::new(1);
        let h2 = BlockHeader::from_previous(&h1);
        assert_eq!(h2.number, h1.number + 1, "Incrementing block height");
        assert!(h2.timestamp > h1.timestamp, "Timestamp");
        assert_eq!(h2.parent_hash, h1.hash(), "Previous hash");
    }

    #[test]
    fn hash_commits_to_every_field() {
        let header = BlockHeader::new(1);
        let mut other = header.clone();
        other.extra_data = vec![1];
        assert_ne!(header.hash(), other.hash());
        let mut other = header.clone();
        other.difficulty += 1;
        assert_ne!(header.hash(), other.hash());
        assert_eq!(header.hash(), header.clone().hash());
    }

    #[test]
    fn it_decodes_what_it_encodes() {
        let mut header = BlockHeader::from_previous(&BlockHeader::new(1));
        header.extra_data = b"producer".to_vec();
        let decoded = BlockHeader::from_bytes(&header.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, header);
        assert!(BlockHeader::from_bytes(&[1, 2, 3]).is_err());
    }
}
