//! # L1 Block Consumer
//!
//! Single consumer of the finalized-block channel. Every tracker and
//! committee mutation goes through here, one level at a time.
//!
//! ## Flow per block
//!
//! ```text
//! RawFinalizedBlock ──decode──→ FinalizedBlock
//!        │
//!        ├─→ Slot tracker    (headers, arbitration, attestation record)
//!        ├─→ Membership      (committees, topic reconciliation)
//!        ├─→ Shard store     (retention anchor of attested commitments)
//!        └─→ Producer publish (shards of selected headers on produced slots)
//! ```
//!
//! Undecodable and out-of-order blocks are skipped with a warning. A storage
//! failure stops the consumer and is reported as fatal.

use std::sync::Arc;

use dal_02_shard_store::{ShardStoreApi, StoreError};
use dal_03_slot_tracker::{SlotTrackerApi, TrackerError, TransitionReport};
use dal_05_topic_membership::TopicMembershipApi;
use shared_types::{Level, Profile};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::adapters::GossipShardPublisher;
use crate::container::SubsystemContainer;
use crate::l1::{ProtocolRegistry, RawFinalizedBlock};

/// Failures that leave node state unusable.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("slot tracker failed at level {level}: {source}")]
    Tracker {
        level: Level,
        #[source]
        source: TrackerError,
    },

    #[error("shard store failed at level {level}: {source}")]
    Store {
        level: Level,
        #[source]
        source: StoreError,
    },
}

pub struct BlockConsumer {
    registry: ProtocolRegistry,
    tracker: Arc<dyn SlotTrackerApi>,
    membership: Arc<dyn TopicMembershipApi>,
    store: Arc<dyn ShardStoreApi>,
    publisher: Arc<GossipShardPublisher>,
    blocks: mpsc::Receiver<RawFinalizedBlock>,
}

impl BlockConsumer {
    pub fn new(container: &SubsystemContainer, blocks: mpsc::Receiver<RawFinalizedBlock>) -> Self {
        Self {
            registry: container.registry.clone(),
            tracker: container.tracker.clone(),
            membership: container.membership.clone(),
            store: container.store.clone(),
            publisher: container.publisher.clone(),
            blocks,
        }
    }

    /// Drain the block channel until every source is gone.
    pub async fn run(mut self) -> Result<(), ConsumerError> {
        info!("[dal-node] Block consumer started");
        while let Some(raw) = self.blocks.recv().await {
            self.process(&raw)?;
        }
        info!("[dal-node] Block channel closed, consumer exiting");
        Ok(())
    }

    /// Apply one finalized block. Returns `None` when the block was skipped.
    pub fn process(&self, raw: &RawFinalizedBlock) -> Result<Option<TransitionReport>, ConsumerError> {
        let block = match self.registry.decode(raw) {
            Ok(block) => block,
            Err(e) => {
                warn!(level = raw.level, error = %e, "[dal-node] Skipping undecodable block");
                return Ok(None);
            }
        };
        let level = block.level;

        let report = match self.tracker.on_finalized_block(&block) {
            Ok(report) => report,
            Err(e @ (TrackerError::NonMonotonicLevel { .. } | TrackerError::InvalidSlotIndex { .. })) => {
                warn!(level, error = %e, "[dal-node] Skipping rejected block");
                return Ok(None);
            }
            Err(source) => return Err(ConsumerError::Tracker { level, source }),
        };

        match self.membership.on_finalized_block(&block) {
            Ok(diff) if !diff.is_empty() => info!(
                level,
                joined = diff.joined.len(),
                left = diff.left.len(),
                "[dal-node] Topics reconciled"
            ),
            Ok(_) => {}
            Err(e) => warn!(level, error = %e, "[dal-node] Membership update failed"),
        }

        // Attested data is kept for the retention period counted from the
        // level it was attested at.
        if let Some(attested_level) = report.attested_level {
            for header in &report.attested {
                self.store
                    .set_attested_level(&header.commitment, attested_level)
                    .map_err(|source| ConsumerError::Store { level, source })?;
            }
        }

        self.publish_produced(&report);

        info!(
            level,
            selected = report.selected.len(),
            attested = report.attested.len(),
            unattested = report.unattested.len(),
            "[dal-node] Finalized level processed"
        );
        Ok(Some(report))
    }

    /// Push the shards of selected headers on slots this node produces for.
    fn publish_produced(&self, report: &TransitionReport) {
        let profiles = self.membership.profiles();
        for header in &report.selected {
            if !profiles.contains(&Profile::Producer(header.slot_index)) {
                continue;
            }
            let shards = match self.store.shards_of(&header.commitment) {
                Ok(shards) if !shards.is_empty() => shards,
                Ok(_) => {
                    debug!(
                        slot_index = header.slot_index,
                        commitment = %header.commitment,
                        "[dal-node] Selected header has no local shards"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(commitment = %header.commitment, error = %e, "[dal-node] Cannot read shards to publish");
                    continue;
                }
            };
            let published =
                self.publisher
                    .publish_all(header.published_level, header.slot_index, &shards);
            info!(
                level = header.published_level,
                slot_index = header.slot_index,
                commitment = %header.commitment,
                published,
                "[dal-node] Produced slot published"
            );
        }
    }
}
