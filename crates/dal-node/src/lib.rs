//! # DAL Node Runtime
//!
//! Wires the DAL subsystems into a running node. The binary entry point is
//! `main.rs`; everything else is exposed here for the integration suite.
//!
//! ## Data Flow
//!
//! ```text
//!   L1 follower ──RawFinalizedBlock──→ BlockConsumer
//!                                         │
//!                    ┌────────────────────┼─────────────────────┐
//!                    ↓                    ↓                     ↓
//!             SlotTracker(03)     TopicMembership(05)     ShardStore(02)
//!                                         │ join/leave          ↑ put
//!                                         ↓                     │
//!   TcpTransport ←──frames──→ Gossip(04) ─┴──ShardValidator──→ ShardSink
//!                                                               │
//!                                                               ↓
//!                                                       Amplifier(06)
//!
//!   RPC(08) ──→ NodeBackend ──→ Cryptobox(01), Store, Tracker, Attestation(07)
//! ```
//!
//! ## Runtime Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | Finalized levels are applied in strictly increasing order | single [`handlers::BlockConsumer`] |
//! | A shard published at level `P` travels on a topic of committee `P + lag` | `adapters::gossip_bridge` |
//! | One node process per data directory | `DirectoryLock` in the container |
//! | Storage failure while applying a block stops the node | [`runtime::NodeRuntime::fatal_error`] |

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod l1;
pub mod runtime;

pub use container::{ConfigError, ContainerError, NodeConfig, SubsystemContainer};
pub use runtime::NodeRuntime;
