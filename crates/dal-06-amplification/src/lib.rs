//! # Amplification Engine (dal-06)
//!
//! Observers that hold enough shards of a slot rebuild the rest and put
//! them back on the network, so a slot stays retrievable even when its
//! producer only reached part of the committee.
//!
//! ```text
//!  shard stored ──▶ count ≥ threshold? ──no──▶ BelowThreshold
//!                        │ yes
//!                        ▼
//!                 table.try_begin ──skip──▶ AlreadyAmplified / InProgress / AwaitingNewShards
//!                        │
//!                        ▼
//!        missing? ─▶ reconstruct ─▶ missing? ─▶ store + publish missing
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | One attempt per commitment at a time | `AmplificationTable::try_begin` |
//! | Completed commitments never re-amplified | `AmplificationStatus::Done` is final |
//! | Retry only after new arrivals | `Failed { held }` compared to the current count |
//! | Nothing republished when the slot is complete | missing set checked before and after reconstruction |

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    AmplificationError, AmplificationOutcome, AmplificationResult, AmplificationStatus,
};
pub use ports::inbound::AmplificationApi;
pub use ports::outbound::ShardPublisher;
pub use service::Amplifier;
