//! # Slot Tracker (dal-03)
//!
//! Lifecycle of published slot headers, driven only by finalized L1 blocks.
//!
//! ```text
//!                    ┌──────────────────────┐  attestation bit set   ┌──────────┐
//!  publish intent    │  WaitingAttestation  │ ─────────────────────▶ │ Attested │
//!  (PATCH) ──▶ Unseen│  (fee winner)        │ ─────────────────────▶ │Unattested│
//!                    └──────────────────────┘  bit clear / absent    └──────────┘
//!                    ┌──────────────────────┐
//!                    │  NotSelected (loser) │   terminal
//!                    └──────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | One winner per (level, slot_index) | `rank_candidates`: highest fee, then lowest op position |
//! | Terminal statuses never change | `HeaderStatus::can_transition_to` checked on every update |
//! | Only finalized data in the header table | intents live in a separate table |
//! | Levels strictly increase | `NonMonotonicLevel`, state untouched |
//! | Crash consistency | plan, atomic batch write, then in-memory apply |

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::{rank_candidates, HeaderTable, TrackerConfig, TransitionReport};
pub use error::{TrackerError, TrackerResult};
pub use ports::inbound::SlotTrackerApi;
pub use service::SlotTrackerService;
