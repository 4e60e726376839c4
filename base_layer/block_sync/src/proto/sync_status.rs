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

use std::convert::TryFrom;

use crate::{
    blocks::{BlockHash, Difficulty},
    proto,
    sync::Status,
};

impl From<Status> for proto::SyncStatus {
    fn from(status: Status) -> Self {
        Self::from(&status)
    }
}

impl From<&Status> for proto::SyncStatus {
    fn from(status: &Status) -> Self {
        Self {
            number: status.number,
            hash: status.hash.to_string(),
            difficulty: status.difficulty.to_string(),
        }
    }
}

impl TryFrom<proto::SyncStatus> for Status {
    type Error = String;

    fn try_from(status: proto::SyncStatus) -> Result<Self, Self::Error> {
        let hash = status
            .hash
            .parse::<BlockHash>()
            .map_err(|err| format!("Invalid status hash: {}", err))?;
        // Only plain decimal digits are accepted
        if status.difficulty.is_empty() || !status.difficulty.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("Invalid status difficulty `{}`", status.difficulty));
        }
        let difficulty = Difficulty::from_dec_str(&status.difficulty)
            .map_err(|err| format!("Invalid status difficulty `{}`: {:?}", status.difficulty, err))?;
        Ok(Self {
            difficulty,
            hash,
            number: status.number,
        })
    }
}
