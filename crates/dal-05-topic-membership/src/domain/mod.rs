pub mod committees;
pub mod errors;
pub mod topics;

use serde::{Deserialize, Serialize};
use shared_types::{Level, Topic};

pub use committees::CommitteeTable;
pub use errors::{MembershipError, MembershipResult};
pub use topics::{desired_topics, normalize_profiles};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    pub number_of_slots: u16,
    /// Committees older than `current - committee_history` are dropped.
    pub committee_history: Level,
    /// Shards published at level `L` are routed to the committee of
    /// `L + attestation_lag`, the level they are attested at.
    pub attestation_lag: Level,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            number_of_slots: 32,
            committee_history: 16,
            attestation_lag: 0,
        }
    }
}

/// Topics joined and left by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub joined: Vec<Topic>,
    pub left: Vec<Topic>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}
