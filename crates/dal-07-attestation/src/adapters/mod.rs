//! Port implementations for the production services.

use std::collections::BTreeSet;
use std::sync::Arc;

use dal_02_shard_store::ShardStoreApi;
use dal_03_slot_tracker::SlotTrackerApi;
use dal_05_topic_membership::TopicMembershipApi;
use shared_types::{Commitment, Committee, Level, ShardIndex, SlotIndex};

use crate::ports::outbound::{CommitteeProvider, HeaderProvider, ShardAvailability};

pub struct MembershipCommittees(pub Arc<dyn TopicMembershipApi>);

impl CommitteeProvider for MembershipCommittees {
    fn committee(&self, level: Level) -> Option<Arc<Committee>> {
        self.0.committee(level)
    }
}

/// Adapts the slot tracker; intents never count as selected.
pub struct TrackerHeaders(pub Arc<dyn SlotTrackerApi>);

impl HeaderProvider for TrackerHeaders {
    fn selected_commitment(&self, published_level: Level, slot_index: SlotIndex) -> Option<Commitment> {
        self.0
            .selected_header(published_level, slot_index)
            .map(|header| header.commitment)
    }
}

pub struct StoreAvailability(pub Arc<dyn ShardStoreApi>);

impl ShardAvailability for StoreAvailability {
    fn holds_all(&self, commitment: &Commitment, shard_indices: &[ShardIndex]) -> Result<bool, String> {
        let held: BTreeSet<ShardIndex> = self
            .0
            .shard_indices(commitment)
            .map_err(|e| e.to_string())?
            .into_iter()
            .collect();
        Ok(shard_indices.iter().all(|i| held.contains(i)))
    }
}
