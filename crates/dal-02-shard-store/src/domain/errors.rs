//! # Domain Errors

use shared_types::{Commitment, KVStoreError, ShardIndex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The shard does not verify against its commitment.
    #[error("invalid proof for shard {shard_index} of {commitment}: {reason}")]
    InvalidProof {
        commitment: Commitment,
        shard_index: ShardIndex,
        reason: String,
    },

    #[error("shard {shard_index} of {commitment} not found")]
    NotFound {
        commitment: Commitment,
        shard_index: ShardIndex,
    },

    #[error("no commitment proof stored for {commitment}")]
    CommitmentProofNotFound { commitment: Commitment },

    /// Checksum or decoding failure of a persisted value.
    #[error("corrupted entry {key}: {reason}")]
    Corrupted { key: String, reason: String },

    #[error("storage backend failure: {0}")]
    Backend(#[from] KVStoreError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::CommitmentProofNotFound { .. }
        )
    }
}
