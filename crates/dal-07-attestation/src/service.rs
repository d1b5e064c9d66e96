use std::sync::Arc;

use shared_types::{DalParameters, Level, PublicKeyHash, SlotIndex};
use tracing::debug;

use crate::domain::{AttestationError, AttestationResult};
use crate::ports::inbound::AttestationApi;
use crate::ports::outbound::{CommitteeProvider, HeaderProvider, ShardAvailability};

pub struct AttestationResolver {
    parameters: DalParameters,
    committees: Arc<dyn CommitteeProvider>,
    headers: Arc<dyn HeaderProvider>,
    shards: Arc<dyn ShardAvailability>,
}

impl AttestationResolver {
    pub fn new(
        parameters: DalParameters,
        committees: Arc<dyn CommitteeProvider>,
        headers: Arc<dyn HeaderProvider>,
        shards: Arc<dyn ShardAvailability>,
    ) -> Self {
        Self {
            parameters,
            committees,
            headers,
            shards,
        }
    }
}

impl AttestationApi for AttestationResolver {
    fn attestable_slots(&self, pkh: &PublicKeyHash, attested_level: Level) -> AttestationResult<Vec<bool>> {
        let published_level =
            self.parameters
                .published_level(attested_level)
                .ok_or(AttestationError::LevelTooLow {
                    level: attested_level,
                    attestation_lag: self.parameters.attestation_lag,
                })?;
        let committee = self
            .committees
            .committee(attested_level)
            .ok_or(AttestationError::CommitteeUnknown(attested_level))?;
        let assigned = committee.shards_of(pkh);
        if assigned.is_empty() {
            return Err(AttestationError::NotInCommittee {
                pkh: *pkh,
                level: attested_level,
            });
        }

        let mut bits = Vec::with_capacity(self.parameters.number_of_slots as usize);
        for slot_index in 0..self.parameters.number_of_slots as SlotIndex {
            let attestable = match self.headers.selected_commitment(published_level, slot_index) {
                Some(commitment) => self
                    .shards
                    .holds_all(&commitment, assigned)
                    .map_err(AttestationError::Storage)?,
                None => false,
            };
            bits.push(attestable);
        }

        debug!(
            pkh = %pkh,
            attested_level,
            attestable = bits.iter().filter(|b| **b).count(),
            "[dal-07] Attestable slots resolved"
        );
        Ok(bits)
    }
}
