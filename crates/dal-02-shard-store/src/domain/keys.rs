//! Key layout of the shard store tables.
//!
//! | Prefix        | Key suffix                     | Value                  |
//! |---------------|--------------------------------|------------------------|
//! | `shard/`      | commitment (32) ‖ index (BE 2) | bincode `StoredShard`  |
//! | `cproof/`     | commitment (32)                | commitment proof (32)  |
//! | `retention/`  | commitment (32)                | anchor level (BE 4)    |
//!
//! Big-endian indices keep prefix scans in shard order.

use shared_types::{Commitment, Level, ShardIndex};

pub struct KeyPrefix;

impl KeyPrefix {
    pub const SHARD: &'static [u8] = b"shard/";
    pub const COMMITMENT_PROOF: &'static [u8] = b"cproof/";
    pub const RETENTION: &'static [u8] = b"retention/";

    pub fn shard_prefix(commitment: &Commitment) -> Vec<u8> {
        [Self::SHARD, commitment.as_bytes()].concat()
    }

    pub fn shard_key(commitment: &Commitment, index: ShardIndex) -> Vec<u8> {
        let mut key = Self::shard_prefix(commitment);
        key.extend_from_slice(&index.to_be_bytes());
        key
    }

    pub fn commitment_proof_key(commitment: &Commitment) -> Vec<u8> {
        [Self::COMMITMENT_PROOF, commitment.as_bytes()].concat()
    }

    pub fn retention_key(commitment: &Commitment) -> Vec<u8> {
        [Self::RETENTION, commitment.as_bytes()].concat()
    }

    /// Trailing shard index of a `shard/` key.
    pub fn shard_index_of(key: &[u8]) -> Option<ShardIndex> {
        let suffix = key.strip_prefix(Self::SHARD)?;
        let bytes: [u8; 2] = suffix.get(32..34)?.try_into().ok()?;
        Some(ShardIndex::from_be_bytes(bytes))
    }

    /// Commitment of a `shard/` key.
    pub fn commitment_of_shard_key(key: &[u8]) -> Option<Commitment> {
        let suffix = key.strip_prefix(Self::SHARD)?;
        suffix.get(..32)?.try_into().ok().map(Commitment)
    }

    pub fn commitment_of_retention_key(key: &[u8]) -> Option<Commitment> {
        let suffix = key.strip_prefix(Self::RETENTION)?;
        suffix.try_into().ok().map(Commitment)
    }

    pub fn encode_level(level: Level) -> [u8; 4] {
        level.to_be_bytes()
    }

    pub fn decode_level(bytes: &[u8]) -> Option<Level> {
        bytes.try_into().ok().map(Level::from_be_bytes)
    }
}
