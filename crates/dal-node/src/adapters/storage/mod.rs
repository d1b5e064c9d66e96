//! # Storage Backends
//!
//! Every persistent subsystem gets its own table under the data directory:
//!
//! | Table | Directory backend | RocksDB backend |
//! |-------|-------------------|-----------------|
//! | shards | `shards/` (one directory per commitment) | `rocksdb/shards` |
//! | headers | `headers.db` | `rocksdb/headers` |
//! | profiles | `profiles.db` | `rocksdb/profiles` |
//!
//! Enable the `rocksdb` feature to use the RocksDB backend.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

use std::path::Path;

use dal_02_shard_store::{DirectoryKVStore, FileBackedKVStore};
use shared_types::{BatchOperation, KVStoreError, KeyValueStore, ScanResult};

use crate::container::config::StorageBackend;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbStore, Table};

/// A table of whichever backend the node was configured with.
pub enum NodeKV {
    Directory(DirectoryKVStore),
    File(FileBackedKVStore),
    #[cfg(feature = "rocksdb")]
    RocksDb(RocksDbStore),
}

macro_rules! dispatch {
    ($self:expr, $kv:ident => $body:expr) => {
        match $self {
            NodeKV::Directory($kv) => $body,
            NodeKV::File($kv) => $body,
            #[cfg(feature = "rocksdb")]
            NodeKV::RocksDb($kv) => $body,
        }
    };
}

impl KeyValueStore for NodeKV {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        dispatch!(self, kv => kv.get(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        dispatch!(self, kv => kv.put(key, value))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        dispatch!(self, kv => kv.delete(key))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        dispatch!(self, kv => kv.atomic_batch_write(operations))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        dispatch!(self, kv => kv.exists(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        dispatch!(self, kv => kv.prefix_scan(prefix))
    }

    fn prefix_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, KVStoreError> {
        dispatch!(self, kv => kv.prefix_keys(prefix))
    }
}

/// The node's three tables.
pub struct Tables {
    pub shards: NodeKV,
    pub headers: NodeKV,
    pub profiles: NodeKV,
}

impl Tables {
    pub fn open(data_dir: &Path, backend: StorageBackend) -> Result<Self, KVStoreError> {
        match backend {
            StorageBackend::Directory => Ok(Self {
                shards: NodeKV::Directory(DirectoryKVStore::open_shard_table(data_dir.join("shards"))?),
                headers: NodeKV::File(FileBackedKVStore::open(data_dir.join("headers.db"))?),
                profiles: NodeKV::File(FileBackedKVStore::open(data_dir.join("profiles.db"))?),
            }),
            #[cfg(feature = "rocksdb")]
            StorageBackend::RocksDb => {
                let root = data_dir.join("rocksdb");
                Ok(Self {
                    shards: NodeKV::RocksDb(RocksDbStore::open(&root, Table::Shards)?),
                    headers: NodeKV::RocksDb(RocksDbStore::open(&root, Table::Headers)?),
                    profiles: NodeKV::RocksDb(RocksDbStore::open(&root, Table::Profiles)?),
                })
            }
            #[cfg(not(feature = "rocksdb"))]
            StorageBackend::RocksDb => Err(KVStoreError::io("RocksDB backend is not compiled in")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_tables_persist() {
        let dir = TempDir::new().unwrap();
        {
            let tables = Tables::open(dir.path(), StorageBackend::Directory).unwrap();
            tables.headers.put(b"h:1", b"one").unwrap();
            tables
                .profiles
                .atomic_batch_write(vec![BatchOperation::put(b"p".to_vec(), b"x".to_vec())])
                .unwrap();
        }
        let tables = Tables::open(dir.path(), StorageBackend::Directory).unwrap();
        assert_eq!(tables.headers.get(b"h:1").unwrap(), Some(b"one".to_vec()));
        assert!(tables.profiles.exists(b"p").unwrap());
        assert!(dir.path().join("shards").is_dir());
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_backend_missing() {
        let dir = TempDir::new().unwrap();
        assert!(Tables::open(dir.path(), StorageBackend::RocksDb).is_err());
    }
}
