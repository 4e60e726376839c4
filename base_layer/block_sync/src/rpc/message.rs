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

use crate::peer::PeerId;

#[derive(Debug, Clone)]
pub struct Request<T> {
    peer: Option<PeerId>,
    message: T,
}

impl<T> Request<T> {
    pub fn new(message: T) -> Self {
        Self { peer: None, message }
    }

    /// Creates a request that carries the identity of the peer that sent it. Inbound requests delivered by a
    /// transport always have a peer.
    pub fn with_peer(peer: PeerId, message: T) -> Self {
        Self {
            peer: Some(peer),
            message,
        }
    }

    pub fn into_message(self) -> T {
        self.message
    }

    pub fn into_parts(self) -> (Option<PeerId>, T) {
        (self.peer, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct Response<T> {
    payload: T,
}

impl<T> Response<T> {
    pub fn new(message: T) -> Self {
        Self { payload: message }
    }

    pub fn into_message(self) -> T {
        self.payload
    }
}
