//! # Retention GC
//!
//! Runs after every finalized level (`LevelFinalized` on the event bus):
//!
//! 1. Shard store drops commitments whose retention anchor expired.
//! 2. Amplifier forgets them.
//! 3. Slot tracker drops headers and intents outside the window.
//! 4. Amplifier prunes bookkeeping older than the window plus the lag.
//!
//! Failures are logged and retried at the next level; GC is cumulative.

use std::sync::Arc;

use dal_02_shard_store::ShardStoreApi;
use dal_03_slot_tracker::SlotTrackerApi;
use dal_06_amplification::AmplificationApi;
use shared_bus::{DalEvent, EventFilter, EventTopic, Subscription};
use shared_types::Level;
use tracing::{debug, info, warn};

use crate::container::SubsystemContainer;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcReport {
    pub commitments_removed: usize,
    pub headers_removed: usize,
    pub amplifications_pruned: usize,
}

pub struct GcHandler {
    store: Arc<dyn ShardStoreApi>,
    tracker: Arc<dyn SlotTrackerApi>,
    amplifier: Arc<dyn AmplificationApi>,
    /// Amplifier entries older than `level - horizon` are dropped.
    horizon: Level,
    subscription: Subscription,
}

impl GcHandler {
    /// Subscribes immediately so no level finalized after construction is
    /// missed.
    pub fn new(container: &SubsystemContainer) -> Self {
        Self {
            store: container.store.clone(),
            tracker: container.tracker.clone(),
            amplifier: container.amplifier.clone(),
            horizon: container
                .config
                .storage
                .retention_period
                .saturating_add(container.parameters.attestation_lag),
            subscription: container
                .event_bus
                .subscribe(EventFilter::topics(vec![EventTopic::SlotTracker])),
        }
    }

    pub async fn run(mut self) {
        info!(horizon = self.horizon, "[dal-node] GC handler started");
        while let Some(event) = self.subscription.recv().await {
            if let DalEvent::LevelFinalized { level } = event {
                self.collect(level);
            }
        }
        info!("[dal-node] Event bus closed, GC exiting");
    }

    pub fn collect(&self, level: Level) -> GcReport {
        let mut report = GcReport::default();

        match self.store.gc(level) {
            Ok(removed) => {
                self.amplifier.forget(&removed);
                report.commitments_removed = removed.len();
            }
            Err(e) => warn!(level, error = %e, "[dal-02] Shard GC failed"),
        }

        match self.tracker.gc(level) {
            Ok(removed) => report.headers_removed = removed,
            Err(e) => warn!(level, error = %e, "[dal-03] Header GC failed"),
        }

        report.amplifications_pruned = self
            .amplifier
            .prune_below(level.saturating_sub(self.horizon));

        if report != GcReport::default() {
            debug!(level, ?report, "[dal-node] GC pass");
        }
        report
    }
}
