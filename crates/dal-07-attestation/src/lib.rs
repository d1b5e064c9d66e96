//! # Attestation Status Resolver (dal-07)
//!
//! Answers, for an attester and an attested level, which slots it can vouch
//! for: those whose selected commitment has every shard assigned to it in
//! the local store.
//!
//! ```text
//!  attested_level ──▶ committee(attested_level) ──▶ assigned shard indices
//!        │
//!        └─ - lag ──▶ selected commitment per slot ──▶ store holds all? ──▶ bit
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | A true bit implies every assigned shard is stored | `ShardAvailability::holds_all` |
//! | Only selected headers are attestable | `HeaderProvider` reads finalized selections |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{MembershipCommittees, StoreAvailability, TrackerHeaders};
pub use domain::{AttestationError, AttestationResult};
pub use ports::inbound::AttestationApi;
pub use ports::outbound::{CommitteeProvider, HeaderProvider, ShardAvailability};
pub use service::AttestationResolver;
