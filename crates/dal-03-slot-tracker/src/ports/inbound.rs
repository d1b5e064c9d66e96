//! Driving port of the slot tracker.

use shared_types::{Commitment, FinalizedBlock, HeaderStatus, Level, SlotHeader, SlotIndex};

use crate::domain::TransitionReport;
use crate::error::TrackerResult;

/// Header lifecycle API.
///
/// Only the L1 consumer loop calls `on_finalized_block`; every other caller
/// reads. Lookups of unknown coordinates return `None` or an empty list.
pub trait SlotTrackerApi: Send + Sync {
    /// Apply one finalized block.
    ///
    /// ## Errors
    ///
    /// - `NonMonotonicLevel`: `block.level` is not above the last processed level
    /// - `Storage`: the header table could not be persisted; state is unchanged
    fn on_finalized_block(&self, block: &FinalizedBlock) -> TrackerResult<TransitionReport>;

    /// Record a commitment a producer intends to publish. Idempotent; returns
    /// whether the intent was new.
    fn record_publish_intent(
        &self,
        commitment: Commitment,
        level: Level,
        slot_index: SlotIndex,
    ) -> TrackerResult<bool>;

    /// Selected commitment at these coordinates, falling back to a recorded
    /// publish intent when nothing was finalized there.
    ///
    /// The fallback persists after the level finalizes without the header:
    /// an intent that never landed on L1 is still returned, with
    /// `status_of` reporting `Unseen`.
    fn commitment_at(&self, level: Level, slot_index: SlotIndex) -> Option<Commitment>;

    fn status_of(&self, level: Level, slot_index: SlotIndex) -> Option<HeaderStatus>;

    /// Finalized header that won arbitration at these coordinates.
    fn selected_header(&self, level: Level, slot_index: SlotIndex) -> Option<SlotHeader>;

    /// Every known header carrying `commitment`, unseen intents included.
    fn headers_of(&self, commitment: &Commitment) -> Vec<SlotHeader>;

    fn last_processed_level(&self) -> Option<Level>;

    /// Drop headers and intents that left the retention window.
    fn gc(&self, current_level: Level) -> TrackerResult<usize>;
}
