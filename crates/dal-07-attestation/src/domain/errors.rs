use shared_types::{Level, PublicKeyHash};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestationError {
    #[error("{pkh} has no shard assigned at level {level}")]
    NotInCommittee { pkh: PublicKeyHash, level: Level },

    #[error("no committee known for level {0}")]
    CommitteeUnknown(Level),

    #[error("level {level} is below the attestation lag {attestation_lag}")]
    LevelTooLow { level: Level, attestation_lag: u32 },

    #[error("shard availability lookup failed: {0}")]
    Storage(String),
}

impl AttestationError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AttestationError::NotInCommittee { .. } | AttestationError::CommitteeUnknown(_)
        )
    }
}

pub type AttestationResult<T> = Result<T, AttestationError>;
