//! Error types for the slot tracker.

use shared_types::{HeaderStatus, KVStoreError, Level, SlotIndex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Finalized levels must strictly increase.
    #[error("non-monotonic level {received}: last processed level is {last}")]
    NonMonotonicLevel { last: Level, received: Level },

    #[error("slot index {slot_index} out of range ({number_of_slots} slots)")]
    InvalidSlotIndex {
        slot_index: SlotIndex,
        number_of_slots: u16,
    },

    #[error("illegal header transition {from} -> {to}")]
    IllegalTransition { from: HeaderStatus, to: HeaderStatus },

    #[error("corrupted tracker entry: {0}")]
    Corrupted(String),

    #[error("storage failure: {0}")]
    Storage(#[from] KVStoreError),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
