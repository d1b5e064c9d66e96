//! # L1 Boundary Records
//!
//! What the DAL core learns from finalized L1 blocks: protocol parameters,
//! published slot headers, attestation bitsets and committees.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::entities::{Commitment, Fee, Level, PublicKeyHash, ShardIndex, SlotIndex};

/// DAL parameters fixed by the active protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DalParameters {
    pub number_of_slots: u16,
    pub attestation_lag: u32,
    pub slot_size: usize,
    pub page_size: usize,
    pub redundancy_factor: usize,
    pub number_of_shards: usize,
}

impl DalParameters {
    /// Number of distinct shards needed to rebuild a slot.
    pub fn reconstruction_threshold(&self) -> usize {
        self.number_of_shards / self.redundancy_factor
    }

    /// Level at which headers published at `published_level` are attested.
    pub fn attested_level(&self, published_level: Level) -> Level {
        published_level + self.attestation_lag
    }

    /// Publish level matching an attested level, if any.
    pub fn published_level(&self, attested_level: Level) -> Option<Level> {
        attested_level.checked_sub(self.attestation_lag)
    }
}

impl Default for DalParameters {
    fn default() -> Self {
        Self {
            number_of_slots: 32,
            attestation_lag: 8,
            slot_size: 126_944,
            page_size: 3_967,
            redundancy_factor: 8,
            number_of_shards: 512,
        }
    }
}

// =============================================================================
// COMMITTEE
// =============================================================================

/// Assignment of shard indices to attesters for one level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Committee {
    pub level: Level,
    pub assignments: BTreeMap<PublicKeyHash, Vec<ShardIndex>>,
}

impl Committee {
    pub fn new(level: Level, assignments: BTreeMap<PublicKeyHash, Vec<ShardIndex>>) -> Self {
        Self { level, assignments }
    }

    /// Shard indices assigned to `pkh`; empty when not a member.
    pub fn shards_of(&self, pkh: &PublicKeyHash) -> &[ShardIndex] {
        self.assignments.get(pkh).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attester holding `shard_index`.
    pub fn owner_of(&self, shard_index: ShardIndex) -> Option<&PublicKeyHash> {
        self.assignments
            .iter()
            .find(|(_, shards)| shards.contains(&shard_index))
            .map(|(pkh, _)| pkh)
    }

    pub fn members(&self) -> impl Iterator<Item = &PublicKeyHash> {
        self.assignments.keys()
    }

    pub fn is_member(&self, pkh: &PublicKeyHash) -> bool {
        !self.shards_of(pkh).is_empty()
    }
}

// =============================================================================
// SLOT HEADERS
// =============================================================================

/// Lifecycle status of a published slot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderStatus {
    Unseen,
    WaitingAttestation,
    NotSelected,
    Attested,
    Unattested,
}

impl HeaderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HeaderStatus::NotSelected | HeaderStatus::Attested | HeaderStatus::Unattested
        )
    }

    /// Allowed edges of the status machine.
    pub fn can_transition_to(&self, next: HeaderStatus) -> bool {
        use HeaderStatus::*;
        matches!(
            (self, next),
            (Unseen, WaitingAttestation)
                | (Unseen, NotSelected)
                | (WaitingAttestation, Attested)
                | (WaitingAttestation, Unattested)
        )
    }
}

impl fmt::Display for HeaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeaderStatus::Unseen => "unseen",
            HeaderStatus::WaitingAttestation => "waiting_attestation",
            HeaderStatus::NotSelected => "not_selected",
            HeaderStatus::Attested => "attested",
            HeaderStatus::Unattested => "unattested",
        };
        f.write_str(s)
    }
}

/// A commitment publication operation found in a finalized block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedHeader {
    pub slot_index: SlotIndex,
    pub commitment: Commitment,
    pub fee: Fee,
    /// Position of the operation in its block; lower is earlier.
    pub op_position: u32,
}

/// Tracked header with its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotHeader {
    pub published_level: Level,
    pub slot_index: SlotIndex,
    pub commitment: Commitment,
    pub fee: Fee,
    pub op_position: u32,
    pub status: HeaderStatus,
}

/// Attestation bitset finalized for `published_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub published_level: Level,
    /// One entry per slot index.
    pub attested: Vec<bool>,
}

impl AttestationRecord {
    pub fn is_attested(&self, slot_index: SlotIndex) -> bool {
        self.attested
            .get(slot_index as usize)
            .copied()
            .unwrap_or(false)
    }
}

/// Decoded content of a finalized L1 block relevant to the DAL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinalizedBlock {
    pub level: Level,
    #[serde(default)]
    pub headers: Vec<PublishedHeader>,
    #[serde(default)]
    pub attestation: Option<AttestationRecord>,
    #[serde(default)]
    pub committees: Vec<Committee>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkh(b: u8) -> PublicKeyHash {
        PublicKeyHash::from_bytes([b; 20])
    }

    #[test]
    fn test_threshold() {
        let params = DalParameters {
            number_of_shards: 64,
            redundancy_factor: 4,
            ..DalParameters::default()
        };
        assert_eq!(params.reconstruction_threshold(), 16);
    }

    #[test]
    fn test_published_level_underflow() {
        let params = DalParameters::default();
        assert_eq!(params.published_level(3), None);
        assert_eq!(params.published_level(20), Some(12));
        assert_eq!(params.attested_level(12), 20);
    }

    #[test]
    fn test_committee_lookups() {
        let mut assignments = BTreeMap::new();
        assignments.insert(pkh(1), vec![0, 2]);
        assignments.insert(pkh(2), vec![1, 3]);
        let committee = Committee::new(10, assignments);

        assert_eq!(committee.shards_of(&pkh(1)), &[0, 2]);
        assert!(committee.shards_of(&pkh(9)).is_empty());
        assert_eq!(committee.owner_of(3), Some(&pkh(2)));
        assert_eq!(committee.owner_of(7), None);
        assert!(!committee.is_member(&pkh(9)));
    }

    #[test]
    fn test_terminal_statuses_have_no_exit() {
        use HeaderStatus::*;
        let all = [Unseen, WaitingAttestation, NotSelected, Attested, Unattested];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(WaitingAttestation.can_transition_to(Attested));
        assert!(!WaitingAttestation.can_transition_to(NotSelected));
    }

    #[test]
    fn test_attestation_record_out_of_range() {
        let record = AttestationRecord {
            published_level: 4,
            attested: vec![true, false],
        };
        assert!(record.is_attested(0));
        assert!(!record.is_attested(1));
        assert!(!record.is_attested(5));
    }
}
