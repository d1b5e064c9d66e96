//! # Peer Scoring
//!
//! Gossipsub-style score kept per peer, driven by two counters:
//!
//! - **First deliveries**: valid shards this peer delivered before anyone
//!   else. Rewarded, with the counter capped.
//! - **Invalid messages**: shards that failed validation. Penalized.
//!
//! Both counters decay multiplicatively at every heartbeat, so a penalized
//! peer recovers by behaving and a rewarded peer has to keep delivering.
//!
//! ## Thresholds
//!
//! - Score < `prune_threshold`: pruned from every mesh, grafts refused
//! - Score < `graylist_threshold`: all frames from the peer are ignored

use serde::{Deserialize, Serialize};

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerScoreConfig {
    /// Points per first valid delivery.
    pub first_delivery_weight: f64,
    /// Deliveries beyond this count earn nothing more.
    pub first_delivery_cap: f64,
    /// Points per invalid message (negative).
    pub invalid_message_penalty: f64,
    /// Counter multiplier applied at each heartbeat, in `(0, 1)`.
    pub decay: f64,
    /// Counters below this snap to zero.
    pub decay_to_zero: f64,
    pub prune_threshold: f64,
    pub graylist_threshold: f64,
    /// How long the score of a disconnected regular peer is remembered.
    pub retain_score_secs: u64,
}

impl Default for PeerScoreConfig {
    fn default() -> Self {
        Self {
            first_delivery_weight: 1.0,
            first_delivery_cap: 50.0,
            invalid_message_penalty: -20.0,
            decay: 0.9,
            decay_to_zero: 0.01,
            prune_threshold: 0.0,
            graylist_threshold: -80.0,
            retain_score_secs: 3_600,
        }
    }
}

impl PeerScoreConfig {
    /// Faster decay and smaller thresholds, for tests.
    pub fn for_testing() -> Self {
        Self {
            first_delivery_weight: 1.0,
            first_delivery_cap: 5.0,
            invalid_message_penalty: -10.0,
            decay: 0.5,
            decay_to_zero: 0.1,
            prune_threshold: 0.0,
            graylist_threshold: -25.0,
            retain_score_secs: 60,
        }
    }
}

// =============================================================================
// PEER SCORE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerScore {
    first_deliveries: f64,
    invalid_messages: f64,
}

impl PeerScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, config: &PeerScoreConfig) -> f64 {
        let deliveries = self.first_deliveries.min(config.first_delivery_cap);
        deliveries * config.first_delivery_weight
            + self.invalid_messages * config.invalid_message_penalty
    }

    pub fn on_first_delivery(&mut self, config: &PeerScoreConfig) {
        self.first_deliveries = (self.first_deliveries + 1.0).min(config.first_delivery_cap);
    }

    pub fn on_invalid_message(&mut self) {
        self.invalid_messages += 1.0;
    }

    /// One heartbeat worth of decay.
    pub fn decay(&mut self, config: &PeerScoreConfig) {
        for counter in [&mut self.first_deliveries, &mut self.invalid_messages] {
            *counter *= config.decay;
            if *counter < config.decay_to_zero {
                *counter = 0.0;
            }
        }
    }

    pub fn is_below_prune(&self, config: &PeerScoreConfig) -> bool {
        self.score(config) < config.prune_threshold
    }

    pub fn is_graylisted(&self, config: &PeerScoreConfig) -> bool {
        self.score(config) < config.graylist_threshold
    }
}
