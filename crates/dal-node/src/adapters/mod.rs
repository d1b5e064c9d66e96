//! # Adapter Implementations
//!
//! Concrete implementations of the subsystems' outbound ports, plus the
//! node-level infrastructure they need:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     OUTER LAYER (Adapters)                          │
//! │  TcpTransport, NodeKV tables, ShardValidator, ShardSink, NodeBackend│
//! │                              ↑ implements ↑                         │
//! │                    MIDDLE LAYER (Ports)                             │
//! │  PeerTransport, KeyValueStore, MessageValidator, DalBackend, ...    │
//! │                              ↑ uses ↑                               │
//! │                    INNER LAYER (Domain)                             │
//! │  Pure subsystem logic in dal-01 .. dal-08                           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod gossip_bridge;
pub mod identity;
pub mod storage;
pub mod transport;

pub use backend::NodeBackend;
pub use gossip_bridge::{GossipShardPublisher, GossipSlot, GossipSubscriber, ShardSink, ShardValidator};
pub use storage::{NodeKV, Tables};
pub use transport::{Inbound, TcpTransport, TransportConfig, TransportError};
