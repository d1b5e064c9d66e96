//! In-memory header table and the pure transition planner.
//!
//! `plan_block` computes every change a finalized block causes without
//! touching the table; the service persists the plan and only then calls
//! `apply`. A failed write therefore leaves the table as it was.

use std::collections::{BTreeMap, BTreeSet};

use shared_types::{
    Commitment, FinalizedBlock, HeaderStatus, Level, PublishedHeader, SlotHeader, SlotIndex,
};
use tracing::warn;

use super::config::TrackerConfig;
use super::selection::rank_candidates;
use crate::error::{TrackerError, TrackerResult};

/// Everything that changed while processing one finalized level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionReport {
    pub level: Level,
    /// Headers that won arbitration at `level`.
    pub selected: Vec<SlotHeader>,
    pub not_selected: Vec<SlotHeader>,
    pub attested: Vec<SlotHeader>,
    pub unattested: Vec<SlotHeader>,
    /// Set when the block carried an attestation record.
    pub attested_level: Option<Level>,
}

impl TransitionReport {
    fn new(level: Level) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Every header whose status changed, in report order.
    pub fn changes(&self) -> impl Iterator<Item = &SlotHeader> {
        self.selected
            .iter()
            .chain(&self.not_selected)
            .chain(&self.attested)
            .chain(&self.unattested)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    pub report: TransitionReport,
    pub upserts: Vec<SlotHeader>,
    /// Unseen intents superseded by a finalized header.
    pub promoted_intents: Vec<(Level, SlotIndex, Commitment)>,
}

/// Entries that left the retention window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expired {
    pub headers: Vec<(Level, SlotIndex, Commitment)>,
    pub intents: Vec<(Level, SlotIndex, Commitment)>,
}

impl Expired {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.intents.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeaderTable {
    headers: BTreeMap<(Level, SlotIndex), Vec<SlotHeader>>,
    intents: BTreeMap<(Level, SlotIndex), BTreeSet<Commitment>>,
    last_level: Option<Level>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_level(&self) -> Option<Level> {
        self.last_level
    }

    pub fn set_last_level(&mut self, level: Option<Level>) {
        self.last_level = level;
    }

    pub fn len(&self) -> usize {
        self.headers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Insert or replace the header with the same coordinates and commitment.
    pub fn insert_header(&mut self, header: SlotHeader) {
        let entries = self
            .headers
            .entry((header.published_level, header.slot_index))
            .or_default();
        match entries.iter_mut().find(|h| h.commitment == header.commitment) {
            Some(existing) => *existing = header,
            None => entries.push(header),
        }
    }

    /// Returns `false` when the intent was already known.
    pub fn insert_intent(&mut self, level: Level, slot_index: SlotIndex, commitment: Commitment) -> bool {
        self.intents
            .entry((level, slot_index))
            .or_default()
            .insert(commitment)
    }

    pub fn has_intent(&self, level: Level, slot_index: SlotIndex, commitment: &Commitment) -> bool {
        self.intents
            .get(&(level, slot_index))
            .is_some_and(|set| set.contains(commitment))
    }

    fn remove_intent(&mut self, level: Level, slot_index: SlotIndex, commitment: &Commitment) {
        if let Some(set) = self.intents.get_mut(&(level, slot_index)) {
            set.remove(commitment);
            if set.is_empty() {
                self.intents.remove(&(level, slot_index));
            }
        }
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    pub fn plan_block(&self, block: &FinalizedBlock, config: &TrackerConfig) -> TrackerResult<BlockPlan> {
        if let Some(last) = self.last_level {
            if block.level <= last {
                return Err(TrackerError::NonMonotonicLevel {
                    last,
                    received: block.level,
                });
            }
        }

        let mut report = TransitionReport::new(block.level);
        let mut upserts = Vec::new();
        let mut promoted_intents = Vec::new();

        let mut by_slot: BTreeMap<SlotIndex, Vec<&PublishedHeader>> = BTreeMap::new();
        for header in &block.headers {
            if header.slot_index >= config.number_of_slots {
                warn!(
                    level = block.level,
                    slot_index = header.slot_index,
                    "[dal-03] Ignoring header with out-of-range slot index"
                );
                continue;
            }
            by_slot.entry(header.slot_index).or_default().push(header);
        }

        for (slot_index, candidates) in by_slot {
            for (rank, candidate) in rank_candidates(candidates).into_iter().enumerate() {
                let status = if rank == 0 {
                    HeaderStatus::WaitingAttestation
                } else {
                    HeaderStatus::NotSelected
                };
                let header = SlotHeader {
                    published_level: block.level,
                    slot_index,
                    commitment: candidate.commitment,
                    fee: candidate.fee,
                    op_position: candidate.op_position,
                    status,
                };
                if self.has_intent(block.level, slot_index, &candidate.commitment) {
                    promoted_intents.push((block.level, slot_index, candidate.commitment));
                }
                if rank == 0 {
                    report.selected.push(header.clone());
                } else {
                    report.not_selected.push(header.clone());
                }
                upserts.push(header);
            }
        }

        if let Some(record) = &block.attestation {
            let published = record.published_level;
            if published >= block.level {
                warn!(
                    level = block.level,
                    published_level = published,
                    "[dal-03] Ignoring attestation record for a level not yet behind"
                );
            } else {
                if published.saturating_add(config.attestation_lag) != block.level {
                    warn!(
                        level = block.level,
                        published_level = published,
                        "[dal-03] Attestation record does not match the attestation lag"
                    );
                }
                let range = (published, 0)..=(published, SlotIndex::MAX);
                for header in self.headers.range(range).flat_map(|(_, v)| v) {
                    if header.status != HeaderStatus::WaitingAttestation {
                        continue;
                    }
                    let next = if record.is_attested(header.slot_index) {
                        HeaderStatus::Attested
                    } else {
                        HeaderStatus::Unattested
                    };
                    if !header.status.can_transition_to(next) {
                        return Err(TrackerError::IllegalTransition {
                            from: header.status,
                            to: next,
                        });
                    }
                    let updated = SlotHeader {
                        status: next,
                        ..header.clone()
                    };
                    if next == HeaderStatus::Attested {
                        report.attested.push(updated.clone());
                    } else {
                        report.unattested.push(updated.clone());
                    }
                    upserts.push(updated);
                }
                report.attested_level = Some(block.level);
            }
        }

        Ok(BlockPlan {
            report,
            upserts,
            promoted_intents,
        })
    }

    pub fn apply(&mut self, plan: &BlockPlan) {
        for header in &plan.upserts {
            self.insert_header(header.clone());
        }
        for (level, slot_index, commitment) in &plan.promoted_intents {
            self.remove_intent(*level, *slot_index, commitment);
        }
        self.last_level = Some(plan.report.level);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn headers_at(&self, level: Level, slot_index: SlotIndex) -> &[SlotHeader] {
        self.headers
            .get(&(level, slot_index))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The header that won arbitration, whatever its attestation outcome.
    pub fn selected(&self, level: Level, slot_index: SlotIndex) -> Option<&SlotHeader> {
        self.headers_at(level, slot_index)
            .iter()
            .find(|h| h.status != HeaderStatus::NotSelected)
    }

    pub fn intents_at(&self, level: Level, slot_index: SlotIndex) -> Vec<Commitment> {
        self.intents
            .get(&(level, slot_index))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn headers_of(&self, commitment: &Commitment) -> Vec<SlotHeader> {
        let finalized = self
            .headers
            .values()
            .flatten()
            .filter(|h| &h.commitment == commitment)
            .cloned();
        let unseen = self
            .intents
            .iter()
            .filter(|(_, set)| set.contains(commitment))
            .map(|(&(published_level, slot_index), _)| SlotHeader {
                published_level,
                slot_index,
                commitment: *commitment,
                fee: 0,
                op_position: 0,
                status: HeaderStatus::Unseen,
            });
        finalized.chain(unseen).collect()
    }

    // =========================================================================
    // RETENTION
    // =========================================================================

    pub fn expired(&self, current_level: Level, config: &TrackerConfig) -> Expired {
        let mut expired = Expired::default();
        for (&(level, slot), headers) in &self.headers {
            if !config.is_expired(level, current_level) {
                break;
            }
            expired
                .headers
                .extend(headers.iter().map(|h| (level, slot, h.commitment)));
        }
        for (&(level, slot), set) in &self.intents {
            if !config.is_expired(level, current_level) {
                break;
            }
            expired.intents.extend(set.iter().map(|c| (level, slot, *c)));
        }
        expired
    }

    pub fn remove_expired(&mut self, expired: &Expired) {
        for (level, slot, _) in &expired.headers {
            self.headers.remove(&(*level, *slot));
        }
        for (level, slot, commitment) in &expired.intents {
            self.remove_intent(*level, *slot, commitment);
        }
    }
}
