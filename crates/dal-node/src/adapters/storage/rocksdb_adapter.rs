//! # RocksDB Storage Adapter
//!
//! RocksDB implementation of [`KeyValueStore`], one database per node table
//! under `<data_dir>/rocksdb/<table>`.
//!
//! | Table | Values | Tuning |
//! |-------|--------|--------|
//! | `shards` | field elements + proof, KiB each | no compression, large write buffer |
//! | `headers` | small bincode records | Snappy, bloom filter |
//! | `profiles` | one record | Snappy |
//!
//! Shares are uniformly distributed field elements, so compressing them only
//! costs CPU.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{
    BlockBasedOptions, Cache, DBCompressionType, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use shared_types::{BatchOperation, KVStoreError, KeyValueStore, ScanResult};
use tracing::info;

/// Which node table a database holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Shards,
    Headers,
    Profiles,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Shards => "shards",
            Table::Headers => "headers",
            Table::Profiles => "profiles",
        }
    }

    fn options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let mut block = BlockBasedOptions::default();
        match self {
            Table::Shards => {
                opts.set_compression_type(DBCompressionType::None);
                opts.set_write_buffer_size(64 * 1024 * 1024);
                opts.set_max_write_buffer_number(4);
                block.set_block_size(64 * 1024);
                block.set_block_cache(&Cache::new_lru_cache(128 * 1024 * 1024));
            }
            Table::Headers => {
                opts.set_compression_type(DBCompressionType::Snappy);
                opts.set_write_buffer_size(8 * 1024 * 1024);
                block.set_bloom_filter(10.0, false);
                block.set_block_cache(&Cache::new_lru_cache(16 * 1024 * 1024));
            }
            Table::Profiles => {
                opts.set_compression_type(DBCompressionType::Snappy);
                opts.set_write_buffer_size(1024 * 1024);
            }
        }
        opts.set_block_based_table_factory(&block);
        opts
    }
}

/// One RocksDB table.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    path: PathBuf,
    sync_writes: bool,
}

fn rocks_err(op: &str) -> impl Fn(rocksdb::Error) -> KVStoreError + '_ {
    move |e| KVStoreError::io(format!("RocksDB {op} failed: {e}"))
}

impl RocksDbStore {
    /// Open `<root>/<table>`, creating it if needed. Writes are fsynced.
    pub fn open(root: &Path, table: Table) -> Result<Self, KVStoreError> {
        Self::open_with_sync(root, table, true)
    }

    pub fn open_with_sync(root: &Path, table: Table, sync_writes: bool) -> Result<Self, KVStoreError> {
        let path = root.join(table.name());
        let db = DB::open(&table.options(), &path).map_err(rocks_err("open"))?;
        info!(table = table.name(), path = ?path, "[dal-node] RocksDB table opened");
        Ok(Self {
            db: Arc::new(db),
            path,
            sync_writes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.db.get(key).map_err(rocks_err("get"))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.db
            .put_opt(key, value, &self.write_opts())
            .map_err(rocks_err("put"))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.db
            .delete_opt(key, &self.write_opts())
            .map_err(rocks_err("delete"))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        self.db
            .write_opt(batch, &self.write_opts())
            .map_err(rocks_err("batch write"))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.db
            .get_pinned(key)
            .map(|v| v.is_some())
            .map_err(rocks_err("exists"))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        let mut results = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(rocks_err("scan"))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn prefix_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, KVStoreError> {
        let mut iter = self.db.raw_iterator();
        iter.seek(prefix);
        let mut keys = Vec::new();
        while let Some(key) = iter.key() {
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
            iter.next();
        }
        iter.status().map_err(rocks_err("scan"))?;
        Ok(keys)
    }
}
