use shared_types::{Level, PublicKeyHash};

use crate::domain::AttestationResult;

pub trait AttestationApi: Send + Sync {
    /// One entry per slot index: `true` when every shard assigned to `pkh`
    /// at `attested_level` is held for the commitment selected at
    /// `attested_level - attestation_lag`.
    ///
    /// ## Errors
    ///
    /// - `LevelTooLow`: `attested_level < attestation_lag`
    /// - `CommitteeUnknown`: no committee installed for `attested_level`
    /// - `NotInCommittee`: `pkh` holds no shard at `attested_level`
    /// - `Storage`: the shard store could not be read
    fn attestable_slots(&self, pkh: &PublicKeyHash, attested_level: Level) -> AttestationResult<Vec<bool>>;
}
