//! Single-file key-value store for small tables (profiles, tracker headers).
//!
//! The whole map is rewritten on every mutation through a temp file, fsync and
//! rename, with the map lock held so the file always reflects one map state.
//! Format: `[key_len:u32][key][value_len:u32][value]...`, little endian.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::ports::outbound::{BatchOperation, KVStoreError, KeyValueStore, ScanResult};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

pub struct FileBackedKVStore {
    data: Mutex<Table>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Load the store at `path`; a missing file is an empty store.
    ///
    /// ## Errors
    ///
    /// - `CorruptionError`: the file exists but is truncated mid-record
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read(&path) {
            Ok(bytes) => Self::decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("[dal-02] No existing table at {}", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(KVStoreError::io(e)),
        };
        if !data.is_empty() {
            info!("[dal-02] Loaded {} keys from {}", data.len(), path.display());
        }
        Ok(Self {
            data: Mutex::new(data),
            path,
        })
    }

    fn decode(bytes: &[u8]) -> Result<Table, KVStoreError> {
        fn take<'a>(bytes: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
            let len_bytes: [u8; 4] = bytes.get(*cursor..*cursor + 4)?.try_into().ok()?;
            let len = u32::from_le_bytes(len_bytes) as usize;
            let start = *cursor + 4;
            let field = bytes.get(start..start + len)?;
            *cursor = start + len;
            Some(field)
        }

        let mut data = BTreeMap::new();
        let mut cursor = 0;
        while cursor < bytes.len() {
            let record = take(bytes, &mut cursor).zip(take(bytes, &mut cursor));
            let Some((key, value)) = record else {
                warn!("[dal-02] Truncated record at offset {}", cursor);
                return Err(KVStoreError::CorruptionError {
                    message: format!("truncated record at offset {cursor}"),
                });
            };
            data.insert(key.to_vec(), value.to_vec());
        }
        Ok(data)
    }

    fn save_to_file(&self, data: &Table) -> Result<(), KVStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(KVStoreError::io)?;
        }

        let mut bytes = Vec::new();
        for (key, value) in data {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value);
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(KVStoreError::io)?;
        file.write_all(&bytes).map_err(KVStoreError::io)?;
        file.sync_all().map_err(KVStoreError::io)?;
        std::fs::rename(&temp_path, &self.path).map_err(KVStoreError::io)
    }

    /// Apply `mutate` to a copy of the map, persist it, then publish it. A
    /// failed write leaves both the file and the map unchanged.
    fn commit(&self, mutate: impl FnOnce(&mut Table) -> bool) -> Result<(), KVStoreError> {
        let mut data = self.data.lock();
        let mut next = data.clone();
        if mutate(&mut next) {
            self.save_to_file(&next)?;
            *data = next;
        }
        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.commit(|data| {
            data.insert(key.to_vec(), value.to_vec());
            true
        })
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.commit(|data| data.remove(key).is_some())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.commit(|data| {
            for op in operations {
                match op {
                    BatchOperation::Put { key, value } => {
                        data.insert(key, value);
                    }
                    BatchOperation::Delete { key } => {
                        data.remove(&key);
                    }
                }
            }
            true
        })
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.lock().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        Ok(self
            .data
            .lock()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");
        {
            let store = FileBackedKVStore::open(&path).unwrap();
            store.put(b"profiles", b"[\"bootstrap\"]").unwrap();
        }
        let store = FileBackedKVStore::open(&path).unwrap();
        assert_eq!(store.get(b"profiles").unwrap(), Some(b"[\"bootstrap\"]".to_vec()));
    }

    #[test]
    fn test_truncated_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        std::fs::write(&path, [5, 0, 0, 0, b'a']).unwrap();
        assert!(matches!(
            FileBackedKVStore::open(&path),
            Err(KVStoreError::CorruptionError { .. })
        ));
    }

    #[test]
    fn test_prefix_scan_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackedKVStore::open(dir.path().join("t.db")).unwrap();
        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"h/2".to_vec(), b"2".to_vec()),
                BatchOperation::put(b"h/1".to_vec(), b"1".to_vec()),
                BatchOperation::put(b"i/0".to_vec(), b"0".to_vec()),
            ])
            .unwrap();
        let keys: Vec<_> = store
            .prefix_scan(b"h/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"h/1".to_vec(), b"h/2".to_vec()]);
    }

    #[test]
    fn test_failed_write_leaves_map_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let store = FileBackedKVStore::open(&path).unwrap();
        store.put(b"a", b"1").unwrap();

        // A directory where the temp file goes makes the next save fail.
        std::fs::create_dir(path.with_extension("tmp")).unwrap();
        assert!(store.put(b"b", b"2").is_err());
        assert_eq!(store.get(b"b").unwrap(), None);
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    }
}
