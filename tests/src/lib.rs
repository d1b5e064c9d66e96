//! # DAL Test Suite
//!
//! Cross-crate scenarios for the DAL node.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs          # TestNode: one node's subsystems over a MemoryHub
//! │
//! └── integration/
//!     ├── scenarios.rs    # Publish, arbitration, amplification, bad shards, GC
//!     ├── flows.rs        # Attestation and committee routing across nodes
//!     ├── rpc.rs          # HTTP API over a real container
//!     └── end_to_end.rs   # Two full runtimes over localhost TCP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p dal-tests
//!
//! # By category
//! cargo test -p dal-tests integration::scenarios
//! cargo test -p dal-tests integration::end_to_end
//! ```
//!
//! Hub-based tests run without a Tokio runtime, so amplification happens
//! inline and every delivery order is reproducible.

pub mod harness;
pub mod integration;
