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

//! Block sync configuration.
//!
//! The configuration lives under the `base_node.block_sync` table of the node configuration file:
//!
//! ```toml
//! [base_node.block_sync]
//! skeleton_span = 10
//! skeleton_num_checkpoints = 5
//! max_queued_blocks = 50
//! pop_timeout = 10
//! ```
//!
//! Every key is optional, missing keys take their default value.

use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

use config::Config;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockSyncConfig {
    /// Distance in blocks between two skeleton control points
    pub skeleton_span: u64,
    /// Number of slots requested per skeleton build
    pub skeleton_num_checkpoints: u64,
    /// Capacity of each peer's broadcast block queue. The oldest block is evicted when full.
    pub max_queued_blocks: usize,
    /// How long the live relay loop waits for a broadcast block before giving up on the peer
    #[serde(with = "serializers::seconds")]
    pub pop_timeout: Duration,
    /// Upper bound on the number of headers served for a single GetHeaders request
    pub max_headers_per_request: u64,
    /// Upper bound on the number of blocks served for a single GetBlocks request
    pub max_blocks_per_request: usize,
}

impl Default for BlockSyncConfig {
    fn default() -> Self {
        Self {
            skeleton_span: 10,
            skeleton_num_checkpoints: 5,
            max_queued_blocks: 50,
            pop_timeout: Duration::from_secs(10),
            max_headers_per_request: 190,
            max_blocks_per_request: 190,
        }
    }
}

impl BlockSyncConfig {
    pub fn main_key_prefix() -> &'static str {
        "base_node.block_sync"
    }

    /// Loads the configuration from the `base_node.block_sync` table. A missing table yields the defaults.
    pub fn load_from(config: &Config) -> Result<Self, ConfigurationError> {
        let cfg = match config.get::<Self>(Self::main_key_prefix()) {
            Ok(cfg) => cfg,
            Err(config::ConfigError::NotFound(_)) => Self::default(),
            Err(err) => return Err(err.into()),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.skeleton_span == 0 {
            return Err(ConfigurationError::new("skeleton_span", "must be greater than zero"));
        }
        if self.skeleton_num_checkpoints == 0 {
            return Err(ConfigurationError::new(
                "skeleton_num_checkpoints",
                "must be greater than zero",
            ));
        }
        if self.max_queued_blocks == 0 {
            return Err(ConfigurationError::new("max_queued_blocks", "must be greater than zero"));
        }
        if self.max_headers_per_request == 0 {
            return Err(ConfigurationError::new(
                "max_headers_per_request",
                "must be greater than zero",
            ));
        }
        if self.max_blocks_per_request == 0 {
            return Err(ConfigurationError::new(
                "max_blocks_per_request",
                "must be greater than zero",
            ));
        }
        // A slot fetch requests span + 1 headers and a skeleton build num + 1
        if self.skeleton_span >= self.max_headers_per_request {
            return Err(ConfigurationError::new(
                "skeleton_span",
                "must be less than max_headers_per_request",
            ));
        }
        if self.skeleton_num_checkpoints >= self.max_headers_per_request {
            return Err(ConfigurationError::new(
                "skeleton_num_checkpoints",
                "must be less than max_headers_per_request",
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ConfigurationError {
    field: String,
    message: String,
}

impl ConfigurationError {
    pub fn new(field: &str, msg: &str) -> Self {
        ConfigurationError {
            field: String::from(field),
            message: String::from(msg),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "Invalid value for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigurationError {}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        use config::ConfigError;
        match err {
            ConfigError::Type { ref key, .. } => Self {
                field: key.clone().unwrap_or_default(),
                message: err.to_string(),
            },
            ConfigError::NotFound(key) => Self {
                field: key,
                message: "required key not found".to_string(),
            },
            x => Self::new("", x.to_string().as_str()),
        }
    }
}

pub mod serializers {
    pub mod seconds {
        //! Helper module for serialising configuration variables from `Duration` to integers representing seconds and
        //! back. Use this converter by employing
        //! ```ignore
        //! use ridge_block_sync::config::serializers::seconds;
        //! ...
        //! #[serde(with="seconds")]
        //! pub my_var: Duration
        //! ```
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
        where D: Deserializer<'de> {
            Ok(Duration::from_secs(u64::deserialize(deserializer)?))
        }

        pub fn serialize<S>(duration: &Duration, s: S) -> Result<S::Ok, S::Error>
        where S: Serializer {
            s.serialize_u64(duration.as_secs())
        }
    }
}

#[cfg(test)]
mod test {
    use config::{File, FileFormat};

    use super::*;

    fn load(toml: &str) -> Result<BlockSyncConfig, ConfigurationError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        BlockSyncConfig::load_from(&config)
    }

    #[test]
    fn missing_section_uses_defaults() {
        let cfg = load("[base_node]\nnetwork = \"localnet\"\n").unwrap();
        assert_eq!(cfg, BlockSyncConfig::default());
        assert_eq!(cfg.skeleton_span, 10);
        assert_eq!(cfg.skeleton_num_checkpoints, 5);
        assert_eq!(cfg.max_queued_blocks, 50);
        assert_eq!(cfg.pop_timeout, Duration::from_secs(10));
    }

    #[test]
    fn it_overrides_individual_values() {
        let cfg = load(
            r#"
            [base_node.block_sync]
            skeleton_span = 20
            pop_timeout = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.skeleton_span, 20);
        assert_eq!(cfg.pop_timeout, Duration::from_secs(3));
        assert_eq!(cfg.skeleton_num_checkpoints, 5);
        assert_eq!(cfg.max_queued_blocks, 50);
    }

    #[test]
    fn it_rejects_invalid_values() {
        let err = load("[base_node.block_sync]\nskeleton_span = 0\n").unwrap_err();
        assert_eq!(err.field(), "skeleton_span");
        assert!(load("[base_node.block_sync]\nmax_queued_blocks = 0\n").is_err());
        assert!(load("[base_node.block_sync]\nnot_a_field = 1\n").is_err());
    }

    #[test]
    fn a_slot_must_fit_in_one_header_request() {
        let err = load("[base_node.block_sync]\nskeleton_span = 190\n").unwrap_err();
        assert_eq!(err.field(), "skeleton_span");
        load("[base_node.block_sync]\nskeleton_span = 189\n").unwrap();
        let err = load("[base_node.block_sync]\nmax_headers_per_request = 5\n").unwrap_err();
        assert_eq!(err.field(), "skeleton_span");
    }
}
