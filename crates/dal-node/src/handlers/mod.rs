//! # Background Handlers
//!
//! Long-running tasks spawned by the runtime, one per concern.

pub mod block_consumer;
pub mod gc;
pub mod gossip_inbound;
pub mod heartbeat;
pub mod metrics_bridge;

pub use block_consumer::{BlockConsumer, ConsumerError};
pub use gc::{GcHandler, GcReport};
pub use gossip_inbound::GossipInboundHandler;
pub use heartbeat::HeartbeatHandler;
pub use metrics_bridge::MetricsBridge;
