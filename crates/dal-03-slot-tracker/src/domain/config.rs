use shared_types::{DalParameters, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub number_of_slots: u16,
    pub attestation_lag: Level,
    /// Levels a header is kept past its attestation level.
    pub retention_period: Level,
}

impl TrackerConfig {
    pub fn from_parameters(params: &DalParameters, retention_period: Level) -> Self {
        Self {
            number_of_slots: params.number_of_slots,
            attestation_lag: params.attestation_lag,
            retention_period,
        }
    }

    /// Headers published at `published_level` are dropped once
    /// `current - (published_level + lag) > retention_period`.
    pub fn is_expired(&self, published_level: Level, current_level: Level) -> bool {
        let attested = published_level.saturating_add(self.attestation_lag);
        current_level.saturating_sub(attested) > self.retention_period
    }
}
