//! Values persisted by the shard store.

use serde::{Deserialize, Serialize};
use shared_types::{Commitment, Shard, ShardIndex, ShardProof};

/// A shard at rest, guarded by a CRC32 over its share and proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredShard {
    pub share: Vec<u8>,
    pub proof: ShardProof,
    pub checksum: u32,
}

impl StoredShard {
    pub fn new(share: Vec<u8>, proof: ShardProof) -> Self {
        let checksum = Self::compute_checksum(&share, &proof);
        Self {
            share,
            proof,
            checksum,
        }
    }

    fn compute_checksum(share: &[u8], proof: &ShardProof) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(share);
        for node in &proof.0 {
            hasher.update(node);
        }
        hasher.finalize()
    }

    pub fn is_intact(&self) -> bool {
        Self::compute_checksum(&self.share, &self.proof) == self.checksum
    }

    pub fn into_shard(self, commitment: Commitment, index: ShardIndex) -> Shard {
        Shard {
            commitment,
            index,
            share: self.share,
            proof: self.proof,
        }
    }
}

/// Result of an accepted `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// First physical copy written.
    Stored,
    /// Identical bytes were already present; nothing written.
    AlreadyStored,
}

/// Outcome of a startup integrity scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub shards_checked: usize,
    /// Keys whose value failed to decode or checksum.
    pub corrupted_keys: Vec<Vec<u8>>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.corrupted_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_detects_flip() {
        let mut stored = StoredShard::new(vec![1, 2, 3], ShardProof(vec![[4; 32]]));
        assert!(stored.is_intact());
        stored.share[1] ^= 0x80;
        assert!(!stored.is_intact());
    }
}
