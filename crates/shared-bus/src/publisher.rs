//! # Event Publisher
//!
//! Emission side of the bus. Subsystem services are synchronous, so the only
//! way to publish is [`EventSink::emit`], which never blocks.
//!
//! The bus counts live subscriptions per [`EventTopic`]. An event whose topic
//! no subscription asks for is not sent at all, so a burst of
//! `StoredSlotShard` events cannot push a GC-only subscriber into lag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::events::{DalEvent, EventFilter, EventTopic};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Synchronous emission side, usable from non-async subsystem services.
pub trait EventSink: Send + Sync {
    /// Emit an event; returns the number of subscribers that received it.
    fn emit(&self, event: DalEvent) -> usize;
}

/// Sink that drops every event. Used where no observer is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: DalEvent) -> usize {
        0
    }
}

/// Live subscriptions per topic. Unfiltered subscriptions count under
/// [`EventTopic::All`].
pub(crate) type Interest = Arc<Mutex<HashMap<EventTopic, usize>>>;

pub(crate) fn interest_keys(filter: &EventFilter) -> Vec<EventTopic> {
    if filter.topics.is_empty() || filter.topics.contains(&EventTopic::All) {
        vec![EventTopic::All]
    } else {
        filter.topics.clone()
    }
}

/// In-memory event bus over a `tokio::sync::broadcast` channel.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<DalEvent>,
    interest: Interest,
    emitted: AtomicU64,
    /// Events lost by lagging subscribers, across all subscriptions.
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            interest: Arc::new(Mutex::new(HashMap::new())),
            emitted: AtomicU64::new(0),
            dropped: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Subscribe to events matching `filter`. Only events emitted after this
    /// call are received.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        {
            let mut interest = self.interest.lock();
            for key in interest_keys(&filter) {
                *interest.entry(key).or_insert(0) += 1;
            }
        }
        debug!(topics = ?filter.topics, "[bus] Subscription created");
        Subscription::new(
            receiver,
            filter,
            Arc::clone(&self.interest),
            Arc::clone(&self.dropped),
        )
    }

    /// Whether any live subscription would receive an event of `topic`.
    pub fn is_observed(&self, topic: EventTopic) -> bool {
        let interest = self.interest.lock();
        [EventTopic::All, topic]
            .iter()
            .any(|key| interest.get(key).is_some_and(|n| *n > 0))
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events handed to the channel so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Events lagging subscribers never saw.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for InMemoryEventBus {
    fn emit(&self, event: DalEvent) -> usize {
        if !self.is_observed(event.topic()) {
            return 0;
        }
        let name = event.name();
        self.emitted.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(event = name, receivers, "[bus] Event emitted");
                receivers
            }
            // Every subscription was dropped in between.
            Err(_) => 0,
        }
    }
}
