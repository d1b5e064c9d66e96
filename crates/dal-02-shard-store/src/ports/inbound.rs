//! # Inbound Ports (Driving Ports)
//!
//! API the gossip validator, the amplification engine, the attestation
//! resolver and the RPC handlers call into. Methods take `&self`; the service
//! serializes writers internally.

use dal_01_cryptobox::EncodedSlot;
use shared_types::{Commitment, CommitmentProof, Level, Shard, ShardIndex};

use crate::domain::entities::{IntegrityReport, PutOutcome};
use crate::domain::errors::StoreError;

pub trait ShardStoreApi: Send + Sync {
    /// Store a shard after checking its proof against `commitment`.
    ///
    /// ## Errors
    ///
    /// - `InvalidProof`: verification failed, nothing is written
    /// - `Backend`: the key-value store failed
    fn put(&self, shard: Shard) -> Result<PutOutcome, StoreError>;

    /// ## Errors
    ///
    /// - `NotFound`: no shard stored under this key
    /// - `Corrupted`: checksum mismatch on read
    fn get(&self, commitment: &Commitment, shard_index: ShardIndex) -> Result<Shard, StoreError>;

    /// All stored shards of `commitment`, in index order.
    fn shards_of(&self, commitment: &Commitment) -> Result<Vec<Shard>, StoreError>;

    /// Remove every shard of `commitment`; returns how many were removed.
    fn delete_all(&self, commitment: &Commitment) -> Result<usize, StoreError>;

    fn count(&self, commitment: &Commitment) -> Result<usize, StoreError>;

    fn shard_indices(&self, commitment: &Commitment) -> Result<Vec<ShardIndex>, StoreError>;

    fn contains(&self, commitment: &Commitment, shard_index: ShardIndex) -> Result<bool, StoreError>;

    /// Store every shard of a locally encoded slot plus its commitment proof.
    fn put_slot(&self, encoded: &EncodedSlot) -> Result<usize, StoreError>;

    fn commitment_proof(&self, commitment: &Commitment) -> Result<CommitmentProof, StoreError>;

    /// Move the retention anchor of `commitment` to its attested level.
    fn set_attested_level(&self, commitment: &Commitment, level: Level) -> Result<(), StoreError>;

    /// Anchor `commitment` at `level` unless it already has an anchor.
    fn anchor_if_absent(&self, commitment: &Commitment, level: Level) -> Result<(), StoreError>;

    /// Anchor `commitment` at `level` unless its anchor is already later.
    fn extend_anchor(&self, commitment: &Commitment, level: Level) -> Result<(), StoreError>;

    /// Delete every commitment whose anchor left the retention window.
    fn gc(&self, current_level: Level) -> Result<Vec<Commitment>, StoreError>;

    /// Scan every stored shard and check its checksum.
    fn verify_integrity(&self) -> Result<IntegrityReport, StoreError>;
}
