//! One-file-per-key store.
//!
//! Every key maps to a file named after its hex encoding. A value is written to
//! a unique temp file, fsynced, then renamed over the final name, so a crash
//! leaves either the old or the new value but never a torn one. Writers of
//! different keys share no lock.
//!
//! Keys under a [`Bucket`] tag are grouped into one subdirectory per bucket
//! head, so listing a bucket touches only its own directory:
//!
//! ```text
//! <root>/
//! ├── 7265746e...          flat key (retention/, cproof/)
//! ├── 7368617264...3f.d/   bucket: shard/ ‖ commitment
//! │   ├── 0000             shard 0
//! │   └── 00ff             shard 255
//! └── JOURNAL.17           batch in flight
//! ```
//!
//! Batches go through a journal: the whole batch is made durable in its own
//! `JOURNAL.<seq>` file before any key is touched, and journals found at open
//! time are replayed.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::keys::KeyPrefix;
use crate::ports::outbound::{BatchOperation, KVStoreError, KeyValueStore, ScanResult};

const JOURNAL: &str = "JOURNAL";
const TMP_SUFFIX: &str = ".tmp";
const BUCKET_SUFFIX: &str = ".d";

#[derive(Serialize, Deserialize)]
enum JournalOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Keys starting with `tag` are grouped by their first `tag.len() + len` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    tag: Vec<u8>,
    len: usize,
}

impl Bucket {
    pub fn new(tag: &[u8], len: usize) -> Self {
        Self {
            tag: tag.to_vec(),
            len,
        }
    }

    fn head_len(&self) -> usize {
        self.tag.len() + self.len
    }

    /// `(head, tail)` of a key that belongs to this bucket.
    fn split<'k>(&self, key: &'k [u8]) -> Option<(&'k [u8], &'k [u8])> {
        (key.starts_with(&self.tag) && key.len() > self.head_len()).then(|| key.split_at(self.head_len()))
    }

    /// Whether every key matching `prefix` falls in a single bucket directory.
    fn covers(&self, prefix: &[u8]) -> bool {
        prefix.starts_with(&self.tag) && prefix.len() >= self.head_len()
    }
}

pub struct DirectoryKVStore {
    root: PathBuf,
    buckets: Vec<Bucket>,
    seq: AtomicU64,
}

impl DirectoryKVStore {
    /// Open (creating if needed) a flat store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, KVStoreError> {
        Self::open_with_buckets(root, Vec::new())
    }

    /// Open the shard table: one bucket directory per commitment.
    pub fn open_shard_table<P: AsRef<Path>>(root: P) -> Result<Self, KVStoreError> {
        Self::open_with_buckets(root, vec![Bucket::new(KeyPrefix::SHARD, 32)])
    }

    pub fn open_with_buckets<P: AsRef<Path>>(root: P, buckets: Vec<Bucket>) -> Result<Self, KVStoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(KVStoreError::io)?;
        let store = Self {
            root,
            buckets,
            seq: AtomicU64::new(0),
        };
        store.remove_stale_temp_files();
        store.replay_journals()?;
        info!("[dal-02] Opened directory store at {}", store.root.display());
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn bucket_dir(&self, head: &[u8]) -> PathBuf {
        self.root.join(format!("{}{BUCKET_SUFFIX}", hex::encode(head)))
    }

    fn path_of(&self, key: &[u8]) -> PathBuf {
        match self.buckets.iter().find_map(|b| b.split(key)) {
            Some((head, tail)) => self.bucket_dir(head).join(hex::encode(tail)),
            None => self.root.join(hex::encode(key)),
        }
    }

    fn try_write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}{TMP_SUFFIX}", self.next_seq()));
        let tmp = PathBuf::from(tmp);
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), KVStoreError> {
        // A bucket emptied by a concurrent delete can vanish between
        // `create_dir_all` and `File::create`.
        match self.try_write(path, bytes) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.try_write(path, bytes),
            other => other,
        }
        .map_err(KVStoreError::io)
    }

    fn remove_file(path: &Path) -> Result<(), KVStoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KVStoreError::io(e)),
        }
    }

    fn remove_key(&self, key: &[u8]) -> Result<(), KVStoreError> {
        let path = self.path_of(key);
        Self::remove_file(&path)?;
        if let Some(parent) = path.parent().filter(|p| *p != self.root) {
            // Fails while the bucket still holds keys.
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }

    fn apply(&self, ops: &[JournalOp]) -> Result<(), KVStoreError> {
        for op in ops {
            match op {
                JournalOp::Put(key, value) => self.write_atomic(&self.path_of(key), value)?,
                JournalOp::Delete(key) => self.remove_key(key)?,
            }
        }
        Ok(())
    }

    fn replay_journals(&self) -> Result<(), KVStoreError> {
        let mut journals: Vec<(u64, PathBuf)> = fs::read_dir(&self.root)
            .map_err(KVStoreError::io)?
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let seq = name.strip_prefix(JOURNAL)?;
                let seq = seq.strip_prefix('.').unwrap_or(seq).parse().unwrap_or(0);
                Some((seq, entry.path()))
            })
            .collect();
        journals.sort();

        for (_, journal) in journals {
            let bytes = fs::read(&journal).map_err(KVStoreError::io)?;
            let ops: Vec<JournalOp> =
                bincode::deserialize(&bytes).map_err(|e| KVStoreError::CorruptionError {
                    message: format!("unreadable journal {}: {e}", journal.display()),
                })?;
            warn!("[dal-02] Replaying interrupted batch of {} operations", ops.len());
            self.apply(&ops)?;
            Self::remove_file(&journal)?;
        }
        Ok(())
    }

    fn remove_stale_temp_files(&self) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TMP_SUFFIX) {
                let _ = fs::remove_file(entry.path());
            } else if name.ends_with(BUCKET_SUFFIX) {
                let Ok(inner) = fs::read_dir(entry.path()) else {
                    continue;
                };
                for file in inner.flatten() {
                    if file.file_name().to_string_lossy().ends_with(TMP_SUFFIX) {
                        let _ = fs::remove_file(file.path());
                    }
                }
            }
        }
    }

    /// Keys stored as files in `dir`, each prefixed with `head`.
    fn list(dir: &Path, head: &[u8], out: &mut Vec<Vec<u8>>) -> Result<(), KVStoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(KVStoreError::io(e)),
        };
        for entry in entries {
            let entry = entry.map_err(KVStoreError::io)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            if let Ok(tail) = hex::decode(name.as_ref()) {
                out.push([head, tail.as_slice()].concat());
            }
        }
        Ok(())
    }
}

impl KeyValueStore for DirectoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        match fs::read(self.path_of(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KVStoreError::io(e)),
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.write_atomic(&self.path_of(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.remove_key(key)
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let ops: Vec<JournalOp> = operations
            .into_iter()
            .map(|op| match op {
                BatchOperation::Put { key, value } => JournalOp::Put(key, value),
                BatchOperation::Delete { key } => JournalOp::Delete(key),
            })
            .collect();
        if let [single] = ops.as_slice() {
            return self.apply(std::slice::from_ref(single));
        }

        let journal = self.root.join(format!("{JOURNAL}.{}", self.next_seq()));
        let bytes = bincode::serialize(&ops).map_err(KVStoreError::io)?;
        self.write_atomic(&journal, &bytes)?;
        self.apply(&ops)?;
        Self::remove_file(&journal)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.path_of(key).exists())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        let keys = self.prefix_keys(prefix)?;
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            // Concurrent deletes may race the listing.
            if let Some(value) = self.get(&key)? {
                results.push((key, value));
            }
        }
        Ok(results)
    }

    fn prefix_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, KVStoreError> {
        let mut keys = Vec::new();
        if let Some(bucket) = self.buckets.iter().find(|b| b.covers(prefix)) {
            let head = &prefix[..bucket.head_len()];
            Self::list(&self.bucket_dir(head), head, &mut keys)?;
        } else {
            for entry in fs::read_dir(&self.root).map_err(KVStoreError::io)? {
                let entry = entry.map_err(KVStoreError::io)?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.ends_with(TMP_SUFFIX) || name.starts_with(JOURNAL) {
                    continue;
                }
                match name.strip_suffix(BUCKET_SUFFIX) {
                    Some(head_hex) => {
                        let Ok(head) = hex::decode(head_hex) else {
                            continue;
                        };
                        if head.starts_with(prefix) || prefix.starts_with(&head) {
                            Self::list(&entry.path(), &head, &mut keys)?;
                        }
                    }
                    None => {
                        if let Ok(key) = hex::decode(name.as_ref()) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}
