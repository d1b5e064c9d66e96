//! # Outbound Ports
//!
//! Read-only views over the committee table, the header table and the
//! shard store. Implemented for the production services in `adapters`.

use std::sync::Arc;

use shared_types::{Commitment, Committee, Level, ShardIndex, SlotIndex};

pub trait CommitteeProvider: Send + Sync {
    fn committee(&self, level: Level) -> Option<Arc<Committee>>;
}

pub trait HeaderProvider: Send + Sync {
    /// Commitment of the header selected at these coordinates.
    fn selected_commitment(&self, published_level: Level, slot_index: SlotIndex) -> Option<Commitment>;
}

pub trait ShardAvailability: Send + Sync {
    /// `Err(reason)` when the lookup itself failed.
    fn holds_all(&self, commitment: &Commitment, shard_indices: &[ShardIndex]) -> Result<bool, String>;
}
