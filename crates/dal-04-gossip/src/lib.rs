//! # Gossipsub Overlay (dal-04)
//!
//! Topic-partitioned shard dissemination. One topic per (slot index,
//! attester); each joined topic keeps a mesh of `D` peers that receive every
//! shard eagerly, and everyone else subscribed learns about recent shards
//! lazily through `IHave`/`IWant`.
//!
//! ```text
//!              Publish                 Publish (mesh, minus source)
//!  [Peer A] ───────────▶ [This node] ─────────────────────────────▶ [Mesh peers]
//!                          │  validate ─ Reject → penalty, drop
//!                          │           ─ Ignore → drop
//!                          │           ─ Accept → mcache + sink
//!                          │
//!                          └── heartbeat: prune < threshold, graft to D,
//!                              prune to D, IHave, shift, decay, redial
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | One delivery per (commitment, shard) | `SeenCache` checked before validation |
//! | Invalid shards never forwarded | forwarding only on `ValidationResult::Accept` |
//! | Trusted peers never score-pruned | `PeerRecord::meshable` |
//! | Banned peers cannot connect | `on_peer_connected` refuses and disconnects |
//! | No transport call under the state lock | outbox flushed after unlock |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    ConnectionState, Frame, GossipConfig, GossipError, GossipMessage, GossipResult,
    HeartbeatReport, MessageId, PeerInfo, PeerScoreConfig, MAX_FRAME_SIZE,
};
pub use ports::inbound::GossipApi;
pub use ports::outbound::{
    AcceptAll, DiscardSink, MessageSink, MessageValidator, PeerTransport, ValidationResult,
};
pub use service::GossipService;
