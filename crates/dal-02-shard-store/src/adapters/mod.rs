//! Adapters: on-disk key-value stores, the data directory lock and the
//! cryptobox-backed verifier.

pub mod directory;
pub mod file;
pub mod lock;
pub mod verifier;

pub use directory::{Bucket, DirectoryKVStore};
pub use file::FileBackedKVStore;
pub use lock::{DirectoryLock, LockError};
