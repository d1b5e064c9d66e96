//! # Event Subscriber
//!
//! A [`Subscription`] is one receiver on the bus with a topic filter. Events
//! that do not match the filter are skipped inside `recv`. When the receiver
//! falls more than the channel capacity behind, the oldest events are lost
//! and counted on the bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{DalEvent, EventFilter};
use crate::publisher::{interest_keys, Interest};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Event bus closed")]
    Closed,
}

pub struct Subscription {
    receiver: broadcast::Receiver<DalEvent>,
    filter: EventFilter,
    interest: Interest,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<DalEvent>,
        filter: EventFilter,
        interest: Interest,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            receiver,
            filter,
            interest,
            dropped,
        }
    }

    fn lagged(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
        warn!(lost = count, topics = ?self.filter.topics, "[bus] Subscriber lagged");
    }

    /// Next matching event; `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<DalEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(count)) => self.lagged(count),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<DalEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(count)) => self.lagged(count),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut interest = self.interest.lock();
        for key in interest_keys(&self.filter) {
            if let Some(count) = interest.get_mut(&key) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    interest.remove(&key);
                }
            }
        }
        debug!(topics = ?self.filter.topics, "[bus] Subscription dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;
    use crate::publisher::{EventSink, InMemoryEventBus};
    use shared_types::{Commitment, PeerId};
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_subscription_recv() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        bus.emit(DalEvent::LevelFinalized { level: 7 });

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(received, DalEvent::LevelFinalized { level: 7 });
    }

    #[tokio::test]
    async fn test_subscription_filter_skips_other_topics() {
        let bus = InMemoryEventBus::new();
        let mut store = bus.subscribe(EventFilter::topics(vec![EventTopic::ShardStore]));
        let _gossip = bus.subscribe(EventFilter::topics(vec![EventTopic::Gossip]));

        bus.emit(DalEvent::PeerBanned(PeerId::default()));
        bus.emit(DalEvent::RemovedSlotShards {
            commitment: Commitment::default(),
            count: 4,
        });

        let received = timeout(Duration::from_millis(100), store.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert!(matches!(received, DalEvent::RemovedSlotShards { count: 4, .. }));
    }

    #[test]
    fn test_try_recv_empty() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        assert_eq!(sub.try_recv(), Ok(None));
    }

    #[test]
    fn test_lag_is_counted() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());
        for level in 0..5 {
            bus.emit(DalEvent::LevelFinalized { level });
        }

        let mut seen = Vec::new();
        while let Ok(Some(event)) = sub.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(bus.dropped(), 3);
    }

    #[test]
    fn test_closed_bus() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        drop(bus);
        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
    }
}
