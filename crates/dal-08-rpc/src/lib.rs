//! # RPC Surface (dal-08)
//!
//! REST endpoints over a [`DalBackend`]. Subsystem errors become
//! [`ApiError`]s carrying an HTTP status and a stable `code`:
//!
//! | Status | Codes |
//! |--------|-------|
//! | 400 | `invalid_slot_size`, `invalid_proof`, `invalid_parameter`, `invalid_profiles`, `level_too_low` |
//! | 404 | `not_found`, `not_in_committee`, `committee_unknown` |
//! | 500 | `storage_error`, `reconstruction_failed`, `internal_error` |
//!
//! Reconstruction and commitment run on the blocking pool so a slow slot
//! never stalls the other handlers.

pub mod domain;
pub mod ports;
pub mod router;
pub mod service;

pub use domain::*;
pub use ports::DalBackend;
pub use router::{build_router, AppState};
pub use service::RpcServer;
