//! # Outbound Ports

use shared_types::{Level, Shard, SlotIndex};

/// Publishes a reconstructed shard on the overlay.
///
/// Production: gossip publish on the topic of the shard's owner at `level`.
pub trait ShardPublisher: Send + Sync {
    /// `Err(reason)` when the shard could not be handed to the overlay.
    fn publish(&self, level: Level, slot_index: SlotIndex, shard: &Shard) -> Result<(), String>;
}
