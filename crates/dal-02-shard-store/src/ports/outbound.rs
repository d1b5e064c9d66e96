//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the shard store requires from the host application.

use shared_types::{Commitment, Shard};

pub use shared_types::{BatchOperation, KeyValueStore, KVStoreError, ScanResult};

/// Shard proof verification.
///
/// Production: `Cryptobox` (see `adapters::verifier`).
pub trait ShardVerifier: Send + Sync {
    /// `Err(reason)` when `shard` does not belong to `commitment`.
    fn verify(&self, commitment: &Commitment, shard: &Shard) -> Result<(), String>;
}
