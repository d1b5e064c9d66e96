//! # Overlay Bridges
//!
//! Adapters connecting the gossip overlay to the other subsystems:
//!
//! | Adapter | Port | Direction |
//! |---------|------|-----------|
//! | [`ShardValidator`] | `MessageValidator` | overlay → committee + cryptobox |
//! | [`ShardSink`] | `MessageSink` | overlay → store → amplifier |
//! | [`GossipShardPublisher`] | `ShardPublisher` | amplifier → overlay |
//! | [`GossipSubscriber`] | `TopicSubscriber` | membership → overlay |
//!
//! A message for a shard published at level `P` is routed to, and checked
//! against, the committee of `P + attestation_lag`. Once L1 has included a
//! header for the commitment, the message's level and slot index must match
//! one of its headers.
//!
//! The overlay is built after the membership service and the amplifier, so
//! the adapters pointing back at it go through a [`GossipSlot`] filled once
//! the overlay exists.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use dal_01_cryptobox::Cryptobox;
use dal_02_shard_store::{PutOutcome, ShardStoreApi};
use dal_03_slot_tracker::SlotTrackerApi;
use dal_04_gossip::{
    GossipApi, GossipError, GossipMessage, MessageId, MessageSink, MessageValidator,
    ValidationResult,
};
use dal_05_topic_membership::{TopicMembershipApi, TopicSubscriber};
use dal_06_amplification::{AmplificationApi, AmplificationOutcome, ShardPublisher};
use dal_telemetry::{metric_inc, AMPLIFICATIONS, MESSAGES_RECEIVED, RECONSTRUCTION_DURATION};
use shared_types::{Commitment, Level, Profile, Shard, SlotIndex, Topic};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// The overlay, once it is built.
#[derive(Default)]
pub struct GossipSlot(OnceLock<Arc<dyn GossipApi>>);

impl GossipSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the slot was already filled.
    pub fn fill(&self, gossip: Arc<dyn GossipApi>) -> bool {
        self.0.set(gossip).is_ok()
    }

    pub fn get(&self) -> Option<&Arc<dyn GossipApi>> {
        self.0.get()
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Accepts a shard only if it belongs to its topic's attester, its
/// coordinates agree with any header L1 included for the commitment, and its
/// proof checks out against the commitment.
pub struct ShardValidator {
    membership: Arc<dyn TopicMembershipApi>,
    tracker: Arc<dyn SlotTrackerApi>,
    cryptobox: Arc<Cryptobox>,
    attestation_lag: Level,
}

impl ShardValidator {
    pub fn new(
        membership: Arc<dyn TopicMembershipApi>,
        tracker: Arc<dyn SlotTrackerApi>,
        cryptobox: Arc<Cryptobox>,
        attestation_lag: Level,
    ) -> Self {
        Self {
            membership,
            tracker,
            cryptobox,
            attestation_lag,
        }
    }

    /// Headers are known only once L1 finalized them; before that any
    /// coordinates pass.
    fn check_coordinates(&self, id: &MessageId) -> Result<(), String> {
        let headers = self.tracker.headers_of(&id.commitment);
        if headers.is_empty()
            || headers
                .iter()
                .any(|h| h.published_level == id.level && h.slot_index == id.slot_index)
        {
            return Ok(());
        }
        Err(format!(
            "commitment {} was not published at level {} slot {}",
            id.commitment, id.level, id.slot_index
        ))
    }

    fn check(&self, message: &GossipMessage) -> ValidationResult {
        let id = &message.id;
        if let Err(reason) = self.check_coordinates(id) {
            return ValidationResult::Reject(reason);
        }
        let Some(committee) = self
            .membership
            .committee(id.level.saturating_add(self.attestation_lag))
        else {
            return ValidationResult::Ignore;
        };
        match committee.owner_of(id.shard_index) {
            Some(owner) if *owner == id.pkh => {}
            Some(_) => {
                return ValidationResult::Reject(format!(
                    "shard {} is not assigned to {}",
                    id.shard_index, id.pkh
                ))
            }
            None => {
                return ValidationResult::Reject(format!("shard {} has no owner", id.shard_index))
            }
        }
        match self.cryptobox.verify_shard(&id.commitment, &message.to_shard()) {
            Ok(()) => ValidationResult::Accept,
            Err(e) => ValidationResult::Reject(e.to_string()),
        }
    }
}

impl MessageValidator for ShardValidator {
    fn validate(&self, message: &GossipMessage) -> ValidationResult {
        let result = self.check(message);
        let outcome = match &result {
            ValidationResult::Accept => "accepted",
            ValidationResult::Reject(reason) => {
                debug!(
                    commitment = %message.id.commitment,
                    shard_index = message.id.shard_index,
                    reason = %reason,
                    "[dal-node] Shard rejected"
                );
                "rejected"
            }
            ValidationResult::Ignore => "ignored",
        };
        metric_inc!(MESSAGES_RECEIVED, &[outcome]);
        result
    }
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Stores accepted shards and, for observed slots, triggers amplification.
pub struct ShardSink {
    store: Arc<dyn ShardStoreApi>,
    membership: Arc<dyn TopicMembershipApi>,
    amplifier: Arc<dyn AmplificationApi>,
    attestation_lag: Level,
    runtime: Option<Handle>,
}

impl ShardSink {
    pub fn new(
        store: Arc<dyn ShardStoreApi>,
        membership: Arc<dyn TopicMembershipApi>,
        amplifier: Arc<dyn AmplificationApi>,
        attestation_lag: Level,
    ) -> Self {
        Self {
            store,
            membership,
            amplifier,
            attestation_lag,
            runtime: Handle::try_current().ok(),
        }
    }

    fn observes(&self, slot_index: SlotIndex) -> bool {
        self.membership
            .profiles()
            .iter()
            .any(|p| matches!(p, Profile::Observer(i) if *i == slot_index))
    }

    fn amplify(&self, commitment: Commitment, level: Level, slot_index: SlotIndex) {
        let amplifier = Arc::clone(&self.amplifier);
        let job = move || run_amplification(amplifier.as_ref(), commitment, level, slot_index);
        match &self.runtime {
            Some(runtime) => {
                runtime.spawn_blocking(job);
            }
            None => job(),
        }
    }
}

fn run_amplification(
    amplifier: &dyn AmplificationApi,
    commitment: Commitment,
    level: Level,
    slot_index: SlotIndex,
) {
    let started = Instant::now();
    match amplifier.on_shard_received(commitment, level, slot_index) {
        Ok(AmplificationOutcome::Amplified { republished }) => {
            RECONSTRUCTION_DURATION.observe(started.elapsed().as_secs_f64());
            metric_inc!(AMPLIFICATIONS, &["amplified"]);
            debug!(%commitment, republished, "[dal-node] Slot amplified");
        }
        Ok(AmplificationOutcome::Failed { reason }) => {
            RECONSTRUCTION_DURATION.observe(started.elapsed().as_secs_f64());
            metric_inc!(AMPLIFICATIONS, &["failed"]);
            warn!(%commitment, %reason, "[dal-node] Amplification failed");
        }
        Ok(_) => metric_inc!(AMPLIFICATIONS, &["skipped"]),
        Err(e) => {
            metric_inc!(AMPLIFICATIONS, &["failed"]);
            warn!(%commitment, error = %e, "[dal-node] Amplification aborted");
        }
    }
}

impl MessageSink for ShardSink {
    fn deliver(&self, message: &GossipMessage) {
        let id = message.id;
        match self.store.put(message.to_shard()) {
            Ok(PutOutcome::Stored) => {
                let anchor = id.level.saturating_add(self.attestation_lag);
                if let Err(e) = self.store.anchor_if_absent(&id.commitment, anchor) {
                    warn!(commitment = %id.commitment, error = %e, "[dal-node] Anchoring failed");
                }
                if self.observes(id.slot_index) {
                    self.amplify(id.commitment, id.level, id.slot_index);
                }
            }
            Ok(PutOutcome::AlreadyStored) => {}
            Err(e) => warn!(
                commitment = %id.commitment,
                shard_index = id.shard_index,
                error = %e,
                "[dal-node] Storing received shard failed"
            ),
        }
    }
}

// =============================================================================
// PUBLICATION
// =============================================================================

/// Publishes shards on the topic of their owner in the attesting committee.
pub struct GossipShardPublisher {
    gossip: Arc<GossipSlot>,
    membership: Arc<dyn TopicMembershipApi>,
    attestation_lag: Level,
}

impl GossipShardPublisher {
    pub fn new(
        gossip: Arc<GossipSlot>,
        membership: Arc<dyn TopicMembershipApi>,
        attestation_lag: Level,
    ) -> Self {
        Self {
            gossip,
            membership,
            attestation_lag,
        }
    }

    /// Publish every shard of `shards`; returns how many reached the overlay.
    pub fn publish_all(&self, level: Level, slot_index: SlotIndex, shards: &[Shard]) -> usize {
        shards
            .iter()
            .filter(|shard| match self.publish(level, slot_index, shard) {
                Ok(()) => true,
                Err(reason) => {
                    debug!(shard_index = shard.index, %reason, "[dal-node] Shard not published");
                    false
                }
            })
            .count()
    }
}

impl ShardPublisher for GossipShardPublisher {
    fn publish(&self, level: Level, slot_index: SlotIndex, shard: &Shard) -> Result<(), String> {
        let gossip = self.gossip.get().ok_or("overlay not started")?;
        let attested_level = level.saturating_add(self.attestation_lag);
        let committee = self
            .membership
            .committee(attested_level)
            .ok_or_else(|| format!("no committee for level {attested_level}"))?;
        let Some(pkh) = committee.owner_of(shard.index).copied() else {
            // Unassigned shards have no topic.
            return Ok(());
        };
        let id = MessageId {
            commitment: shard.commitment,
            level,
            slot_index,
            shard_index: shard.index,
            pkh,
        };
        match gossip.publish(GossipMessage::new(id, shard.clone())) {
            Ok(_) | Err(GossipError::DuplicateMessage { .. }) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

pub struct GossipSubscriber(pub Arc<GossipSlot>);

impl TopicSubscriber for GossipSubscriber {
    fn join(&self, topic: Topic) -> bool {
        self.0.get().is_some_and(|gossip| gossip.join(topic))
    }

    fn leave(&self, topic: Topic) -> bool {
        self.0.get().is_some_and(|gossip| gossip.leave(topic))
    }
}
