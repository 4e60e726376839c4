/// Chain head advertised by a node
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncStatus {
    /// Height of the chain tip
    #[prost(uint64, tag = "1")]
    pub number: u64,
    /// Hash of the chain tip in its canonical textual form (0x-prefixed hex)
    #[prost(string, tag = "2")]
    pub hash: ::prost::alloc::string::String,
    /// Total difficulty of the chain tip as a base-10 decimal string
    #[prost(string, tag = "3")]
    pub difficulty: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetHeadersRequest {
    /// Number of headers to skip between returned headers
    #[prost(uint64, tag = "3")]
    pub skip: u64,
    /// Maximum number of headers to return. Zero is treated as one.
    #[prost(uint64, tag = "4")]
    pub amount: u64,
    #[prost(oneof = "get_headers_request::Start", tags = "1, 2")]
    pub start: ::core::option::Option<get_headers_request::Start>,
}
/// Nested message and enum types in `GetHeadersRequest`.
pub mod get_headers_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Start {
        #[prost(uint64, tag = "1")]
        Number(u64),
        #[prost(string, tag = "2")]
        Hash(::prost::alloc::string::String),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetHeadersResponse {
    /// Consensus encoded block headers
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub headers: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBlocksRequest {
    #[prost(string, repeated, tag = "1")]
    pub hashes: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBlocksResponse {
    /// Consensus encoded blocks
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub blocks: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}
/// Broadcast of a newly produced block
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NotifyRequest {
    #[prost(message, optional, tag = "1")]
    pub status: ::core::option::Option<SyncStatus>,
    /// Consensus encoded block
    #[prost(bytes = "vec", tag = "2")]
    pub block: ::prost::alloc::vec::Vec<u8>,
}
