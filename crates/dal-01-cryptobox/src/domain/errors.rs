//! Cryptobox error type.

use shared_types::ShardIndex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoboxError {
    #[error("invalid cryptobox parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid slot size: expected {expected} bytes, got {actual}")]
    InvalidSlotSize { expected: usize, actual: usize },

    #[error("shard index {index} out of range (number_of_shards = {number_of_shards})")]
    ShardIndexOutOfRange {
        index: ShardIndex,
        number_of_shards: usize,
    },

    #[error("invalid shard length: expected {expected} bytes, got {actual}")]
    InvalidShardLength { expected: usize, actual: usize },

    #[error("shard {index} contains a non-canonical field element")]
    InvalidShardEncoding { index: ShardIndex },

    #[error("shard {index} proof does not match the commitment")]
    InvalidShardProof { index: ShardIndex },

    #[error("shard {index} belongs to another commitment")]
    CommitmentMismatch { index: ShardIndex },

    #[error("not enough shards: {required} required, {received} received")]
    NotEnoughShards { required: usize, received: usize },

    #[error("shards are inconsistent with the commitment")]
    InconsistentShards,

    #[error("page index {index} out of range ({number_of_pages} pages)")]
    PageIndexOutOfRange { index: usize, number_of_pages: usize },
}
