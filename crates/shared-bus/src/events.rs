//! # DAL Events
//!
//! Events emitted by subsystems for monitoring and choreography.

use serde::{Deserialize, Serialize};
use shared_types::{Commitment, HeaderStatus, Level, PeerId, ShardIndex, SlotIndex, Topic};

/// Every event that flows over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DalEvent {
    // =========================================================================
    // SHARD STORE
    // =========================================================================
    /// A validated shard was written for the first time.
    StoredSlotShard {
        commitment: Commitment,
        shard_index: ShardIndex,
    },

    /// All shards of a commitment were deleted.
    RemovedSlotShards { commitment: Commitment, count: usize },

    // =========================================================================
    // SLOT TRACKER
    // =========================================================================
    HeaderStatusChanged {
        published_level: Level,
        slot_index: SlotIndex,
        commitment: Commitment,
        status: HeaderStatus,
    },

    /// The L1 consumer finished processing a finalized level.
    LevelFinalized { level: Level },

    // =========================================================================
    // OVERLAY
    // =========================================================================
    TopicJoined(Topic),
    TopicLeft(Topic),
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
    PeerBanned(PeerId),

    // =========================================================================
    // AMPLIFICATION
    // =========================================================================
    AmplificationCompleted {
        commitment: Commitment,
        republished: usize,
    },
    AmplificationFailed { commitment: Commitment, reason: String },
}

impl DalEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::StoredSlotShard { .. } | Self::RemovedSlotShards { .. } => EventTopic::ShardStore,
            Self::HeaderStatusChanged { .. } | Self::LevelFinalized { .. } => EventTopic::SlotTracker,
            Self::TopicJoined(_) | Self::TopicLeft(_) => EventTopic::TopicMembership,
            Self::PeerConnected(_) | Self::PeerDisconnected(_) | Self::PeerBanned(_) => {
                EventTopic::Gossip
            }
            Self::AmplificationCompleted { .. } | Self::AmplificationFailed { .. } => {
                EventTopic::Amplification
            }
        }
    }

    /// Stable event name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StoredSlotShard { .. } => "stored_slot_shard",
            Self::RemovedSlotShards { .. } => "removed_slot_shards",
            Self::HeaderStatusChanged { .. } => "header_status_changed",
            Self::LevelFinalized { .. } => "level_finalized",
            Self::TopicJoined(_) => "topic_joined",
            Self::TopicLeft(_) => "topic_left",
            Self::PeerConnected(_) => "peer_connected",
            Self::PeerDisconnected(_) => "peer_disconnected",
            Self::PeerBanned(_) => "peer_banned",
            Self::AmplificationCompleted { .. } => "amplification_completed",
            Self::AmplificationFailed { .. } => "amplification_failed",
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    ShardStore,
    SlotTracker,
    Gossip,
    TopicMembership,
    Amplification,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &DalEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
