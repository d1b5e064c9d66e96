//! # Shared Types Crate
//!
//! Cross-subsystem vocabulary of the DAL node.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identifiers (commitments, public key hashes,
//!   peer ids), the L1 boundary records and the driven storage/time ports are
//!   defined once here and reused by every `dal-*` crate.
//! - **Human readable at the edges**: commitments and public key hashes render
//!   as base58check strings in JSON and as raw bytes in binary encodings.
//! - **No I/O**: the only adapters shipped here are in-memory ones used by tests.

pub mod entities;
pub mod errors;
pub mod l1;
pub mod storage;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use l1::*;
pub use storage::{BatchOperation, InMemoryKVStore, KeyValueStore, ScanResult};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
