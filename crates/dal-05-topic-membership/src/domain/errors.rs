use shared_types::{KVStoreError, SlotIndex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("the bootstrap profile cannot be combined with other profiles")]
    BootstrapNotExclusive,

    #[error("slot index {slot_index} out of range (number of slots: {number_of_slots})")]
    InvalidSlotIndex {
        slot_index: SlotIndex,
        number_of_slots: u16,
    },

    #[error("persisted profiles are corrupted: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Storage(#[from] KVStoreError),
}

pub type MembershipResult<T> = Result<T, MembershipError>;
