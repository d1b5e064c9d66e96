//! Turns bus events into Prometheus counters.
//!
//! Gauges for peers and topics are refreshed by the heartbeat, amplification
//! outcomes are counted where amplification runs.

use dal_telemetry::{metric_inc, HEADER_TRANSITIONS, L1_FINALIZED_LEVEL, SHARDS_REMOVED, SHARDS_STORED};
use shared_bus::{DalEvent, EventFilter, EventTopic, InMemoryEventBus, Subscription};
use tracing::info;

pub struct MetricsBridge {
    subscription: Subscription,
}

impl MetricsBridge {
    pub fn new(bus: &InMemoryEventBus) -> Self {
        Self {
            subscription: bus.subscribe(EventFilter::topics(vec![
                EventTopic::ShardStore,
                EventTopic::SlotTracker,
            ])),
        }
    }

    pub async fn run(mut self) {
        info!("[dal-node] Metrics bridge started");
        while let Some(event) = self.subscription.recv().await {
            record(&event);
        }
    }
}

fn record(event: &DalEvent) {
    match event {
        DalEvent::StoredSlotShard { .. } => metric_inc!(SHARDS_STORED),
        DalEvent::RemovedSlotShards { count, .. } => SHARDS_REMOVED.inc_by(*count as u64),
        DalEvent::HeaderStatusChanged { status, .. } => {
            metric_inc!(HEADER_TRANSITIONS, &[&status.to_string()])
        }
        DalEvent::LevelFinalized { level } => L1_FINALIZED_LEVEL.set(*level as i64),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Commitment, HeaderStatus};

    #[test]
    fn test_header_transitions_labelled_by_status() {
        let before = HEADER_TRANSITIONS.with_label_values(&["attested"]).get();
        record(&DalEvent::HeaderStatusChanged {
            published_level: 3,
            slot_index: 1,
            commitment: Commitment([1; 32]),
            status: HeaderStatus::Attested,
        });
        assert!(HEADER_TRANSITIONS.with_label_values(&["attested"]).get() > before);
    }

    #[test]
    fn test_removed_shards_counted_by_count() {
        let before = SHARDS_REMOVED.get();
        record(&DalEvent::RemovedSlotShards {
            commitment: Commitment([2; 32]),
            count: 5,
        });
        assert!(SHARDS_REMOVED.get() >= before + 5);
    }
}
