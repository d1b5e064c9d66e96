//! # Shard Store (dal-02)
//!
//! Persistent map `(commitment, shard_index) → shard`, shared by the gossip
//! validator, the amplification engine and the RPC handlers.
//!
//! ## Architecture
//!
//! ```text
//! gossip ─┐                        ┌─ ShardVerifier (Cryptobox)
//! amplify ├─▶ ShardStoreApi ──▶ ShardStoreService ──┤
//! rpc ────┘                        ├─ KeyValueStore (Directory / File / RocksDB / memory)
//!                                  └─ EventSink (stored_slot_shard, removed_slot_shards)
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Only valid shards are stored | proof re-checked on every `put` |
//! | One physical copy per key | compare-and-write under the commitment's lock stripe |
//! | No torn shard | per-key atomic writes in every on-disk backend |
//! | Bounded history | `gc` drops commitments whose anchor left the window |
//! | Silent corruption is visible | CRC32 on every value, `verify_integrity` at startup |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{DirectoryKVStore, DirectoryLock, FileBackedKVStore, LockError};
pub use domain::config::StoreConfig;
pub use domain::entities::{IntegrityReport, PutOutcome, StoredShard};
pub use domain::errors::StoreError;
pub use domain::keys::KeyPrefix;
pub use ports::inbound::ShardStoreApi;
pub use ports::outbound::ShardVerifier;
pub use service::ShardStoreService;
