//! # Shared Bus - Event Bus for DAL Subsystems
//!
//! Subsystems report what they did (shard stored, shards removed, header
//! status changed, topic joined, peer banned, amplification finished) on a
//! single broadcast bus. Monitoring, tests and the RPC layer observe it.
//!
//! ```text
//! ┌──────────────┐   emit()    ┌──────────────┐  subscribe()  ┌──────────────┐
//! │ Shard Store  │ ──────────→ │  Event Bus   │ ────────────→ │  Observers   │
//! │ Tracker ...  │             │ (broadcast)  │               │ (tests, log) │
//! └──────────────┘             └──────────────┘               └──────────────┘
//! ```
//!
//! Services emit through [`EventSink`], which never blocks. Slow subscribers
//! lag and lose the oldest events instead of blocking producers.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{DalEvent, EventFilter, EventTopic};
pub use publisher::{EventSink, InMemoryEventBus, NoopSink};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
