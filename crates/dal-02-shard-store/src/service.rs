//! # Shard Store Service
//!
//! Implements [`ShardStoreApi`] over any [`KeyValueStore`].
//!
//! Writers lock one stripe of a fixed lock array, chosen by commitment. The
//! stripe covers the read-compare-write of a shard key, the batch delete of a
//! commitment and its retention anchor, so at most one physical copy exists
//! per (commitment, shard_index) and gc never removes a slot mid-write.
//! Proof checks run before the stripe is taken. Reads take no lock.

use std::sync::Arc;

use dal_01_cryptobox::EncodedSlot;
use parking_lot::{Mutex, MutexGuard};
use shared_bus::{DalEvent, EventSink, NoopSink};
use shared_types::{Commitment, CommitmentProof, Level, Shard, ShardIndex};
use tracing::{debug, error, info, warn};

use crate::domain::config::StoreConfig;
use crate::domain::entities::{IntegrityReport, PutOutcome, StoredShard};
use crate::domain::errors::StoreError;
use crate::domain::keys::KeyPrefix;
use crate::ports::inbound::ShardStoreApi;
use crate::ports::outbound::{BatchOperation, KeyValueStore, ShardVerifier};

const LOCK_STRIPES: usize = 64;

#[derive(Clone, Copy)]
enum AnchorWrite {
    Overwrite,
    IfAbsent,
    Extend,
}

pub struct ShardStoreService<KV: KeyValueStore> {
    kv: KV,
    locks: Box<[Mutex<()>]>,
    verifier: Arc<dyn ShardVerifier>,
    events: Arc<dyn EventSink>,
    config: StoreConfig,
}

impl<KV: KeyValueStore> ShardStoreService<KV> {
    pub fn new(kv: KV, verifier: Arc<dyn ShardVerifier>, config: StoreConfig) -> Self {
        Self {
            kv,
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            verifier,
            events: Arc::new(NoopSink),
            config,
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn stripe(&self, commitment: &Commitment) -> usize {
        usize::from(u16::from_le_bytes([commitment.0[0], commitment.0[1]])) % self.locks.len()
    }

    fn lock(&self, commitment: &Commitment) -> MutexGuard<'_, ()> {
        self.locks[self.stripe(commitment)].lock()
    }

    fn decode_stored(key: &[u8], bytes: &[u8]) -> Result<StoredShard, StoreError> {
        let stored: StoredShard = bincode::deserialize(bytes).map_err(|e| StoreError::Corrupted {
            key: hex::encode(key),
            reason: e.to_string(),
        })?;
        if !stored.is_intact() {
            return Err(StoreError::Corrupted {
                key: hex::encode(key),
                reason: "checksum mismatch".into(),
            });
        }
        Ok(stored)
    }

    fn encode_stored(stored: &StoredShard) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(stored).map_err(|e| StoreError::Corrupted {
            key: String::new(),
            reason: format!("encoding failed: {e}"),
        })
    }

    fn verify(&self, shard: &Shard) -> Result<(), StoreError> {
        self.verifier
            .verify(&shard.commitment, shard)
            .map_err(|reason| StoreError::InvalidProof {
                commitment: shard.commitment,
                shard_index: shard.index,
                reason,
            })
    }

    /// Caller holds the commitment's stripe.
    fn delete_locked(&self, commitment: &Commitment) -> Result<usize, StoreError> {
        let indices = self.shard_indices(commitment)?;
        let mut ops: Vec<BatchOperation> = indices
            .iter()
            .map(|&i| BatchOperation::delete(KeyPrefix::shard_key(commitment, i)))
            .collect();
        ops.push(BatchOperation::delete(KeyPrefix::commitment_proof_key(commitment)));
        ops.push(BatchOperation::delete(KeyPrefix::retention_key(commitment)));
        self.kv.atomic_batch_write(ops)?;
        Ok(indices.len())
    }

    fn write_anchor(&self, commitment: &Commitment, level: Level, mode: AnchorWrite) -> Result<(), StoreError> {
        let key = KeyPrefix::retention_key(commitment);
        let _guard = self.lock(commitment);
        let skip = match mode {
            AnchorWrite::Overwrite => false,
            AnchorWrite::IfAbsent => self.kv.exists(&key)?,
            AnchorWrite::Extend => self
                .kv
                .get(&key)?
                .and_then(|v| KeyPrefix::decode_level(&v))
                .is_some_and(|current| current >= level),
        };
        if skip {
            return Ok(());
        }
        self.kv.put(&key, &KeyPrefix::encode_level(level))?;
        Ok(())
    }
}

impl<KV: KeyValueStore> ShardStoreApi for ShardStoreService<KV> {
    fn put(&self, shard: Shard) -> Result<PutOutcome, StoreError> {
        self.verify(&shard)?;

        let key = KeyPrefix::shard_key(&shard.commitment, shard.index);
        let stored = StoredShard::new(shard.share, shard.proof);
        {
            let _guard = self.lock(&shard.commitment);
            if let Some(existing) = self.kv.get(&key)? {
                match Self::decode_stored(&key, &existing) {
                    Ok(current) if current == stored => return Ok(PutOutcome::AlreadyStored),
                    Ok(_) => {}
                    Err(e) => warn!("[dal-02] Overwriting unreadable shard entry: {}", e),
                }
            }
            self.kv.put(&key, &Self::encode_stored(&stored)?)?;
        }

        debug!(
            commitment = %shard.commitment,
            shard_index = shard.index,
            "[dal-02] Stored shard"
        );
        self.events.emit(DalEvent::StoredSlotShard {
            commitment: shard.commitment,
            shard_index: shard.index,
        });
        Ok(PutOutcome::Stored)
    }

    fn get(&self, commitment: &Commitment, shard_index: ShardIndex) -> Result<Shard, StoreError> {
        let key = KeyPrefix::shard_key(commitment, shard_index);
        let bytes = self.kv.get(&key)?.ok_or(StoreError::NotFound {
            commitment: *commitment,
            shard_index,
        })?;
        Ok(Self::decode_stored(&key, &bytes)?.into_shard(*commitment, shard_index))
    }

    fn shards_of(&self, commitment: &Commitment) -> Result<Vec<Shard>, StoreError> {
        let entries = self.kv.prefix_scan(&KeyPrefix::shard_prefix(commitment))?;
        entries
            .into_iter()
            .filter_map(|(key, value)| KeyPrefix::shard_index_of(&key).map(|i| (key, i, value)))
            .map(|(key, index, value)| {
                Self::decode_stored(&key, &value).map(|s| s.into_shard(*commitment, index))
            })
            .collect()
    }

    fn delete_all(&self, commitment: &Commitment) -> Result<usize, StoreError> {
        let removed = {
            let _guard = self.lock(commitment);
            self.delete_locked(commitment)?
        };
        if removed > 0 {
            info!(commitment = %commitment, count = removed, "[dal-02] Removed slot shards");
            self.events.emit(DalEvent::RemovedSlotShards {
                commitment: *commitment,
                count: removed,
            });
        }
        Ok(removed)
    }

    fn count(&self, commitment: &Commitment) -> Result<usize, StoreError> {
        Ok(self.shard_indices(commitment)?.len())
    }

    fn shard_indices(&self, commitment: &Commitment) -> Result<Vec<ShardIndex>, StoreError> {
        Ok(self
            .kv
            .prefix_keys(&KeyPrefix::shard_prefix(commitment))?
            .iter()
            .filter_map(|key| KeyPrefix::shard_index_of(key))
            .collect())
    }

    fn contains(&self, commitment: &Commitment, shard_index: ShardIndex) -> Result<bool, StoreError> {
        Ok(self
            .kv
            .exists(&KeyPrefix::shard_key(commitment, shard_index))?)
    }

    fn put_slot(&self, encoded: &EncodedSlot) -> Result<usize, StoreError> {
        {
            let _guard = self.lock(&encoded.commitment);
            self.kv.put(
                &KeyPrefix::commitment_proof_key(&encoded.commitment),
                &encoded.commitment_proof.0,
            )?;
        }
        let mut stored = 0;
        for shard in &encoded.shards {
            if self.put(shard.clone())? == PutOutcome::Stored {
                stored += 1;
            }
        }
        Ok(stored)
    }

    fn commitment_proof(&self, commitment: &Commitment) -> Result<CommitmentProof, StoreError> {
        let key = KeyPrefix::commitment_proof_key(commitment);
        let bytes = self
            .kv
            .get(&key)?
            .ok_or(StoreError::CommitmentProofNotFound {
                commitment: *commitment,
            })?;
        let proof: [u8; 32] = bytes.as_slice().try_into().map_err(|_| StoreError::Corrupted {
            key: hex::encode(&key),
            reason: format!("commitment proof of {} bytes", bytes.len()),
        })?;
        Ok(CommitmentProof(proof))
    }

    fn set_attested_level(&self, commitment: &Commitment, level: Level) -> Result<(), StoreError> {
        self.write_anchor(commitment, level, AnchorWrite::Overwrite)
    }

    fn anchor_if_absent(&self, commitment: &Commitment, level: Level) -> Result<(), StoreError> {
        self.write_anchor(commitment, level, AnchorWrite::IfAbsent)
    }

    fn extend_anchor(&self, commitment: &Commitment, level: Level) -> Result<(), StoreError> {
        self.write_anchor(commitment, level, AnchorWrite::Extend)
    }

    fn gc(&self, current_level: Level) -> Result<Vec<Commitment>, StoreError> {
        let mut removed = Vec::new();
        for (key, value) in self.kv.prefix_scan(KeyPrefix::RETENTION)? {
            let (Some(commitment), Some(anchor)) = (
                KeyPrefix::commitment_of_retention_key(&key),
                KeyPrefix::decode_level(&value),
            ) else {
                warn!("[dal-02] Dropping malformed retention entry {}", hex::encode(&key));
                self.kv.delete(&key)?;
                continue;
            };
            if !self.config.is_expired(anchor, current_level) {
                continue;
            }
            let _guard = self.lock(&commitment);
            // The anchor may have moved since the scan.
            let still_expired = self
                .kv
                .get(&key)?
                .and_then(|v| KeyPrefix::decode_level(&v))
                .is_some_and(|anchor| self.config.is_expired(anchor, current_level));
            if still_expired {
                let count = self.delete_locked(&commitment)?;
                removed.push((commitment, count));
            }
        }

        for (commitment, count) in &removed {
            self.events.emit(DalEvent::RemovedSlotShards {
                commitment: *commitment,
                count: *count,
            });
        }
        if !removed.is_empty() {
            info!(
                level = current_level,
                commitments = removed.len(),
                "[dal-02] Garbage collected expired commitments"
            );
        }
        Ok(removed.into_iter().map(|(c, _)| c).collect())
    }

    fn verify_integrity(&self) -> Result<IntegrityReport, StoreError> {
        let entries = self.kv.prefix_scan(KeyPrefix::SHARD)?;
        let mut report = IntegrityReport::default();
        for (key, value) in entries {
            report.shards_checked += 1;
            if let Err(e) = Self::decode_stored(&key, &value) {
                error!("[dal-02] {}", e);
                report.corrupted_keys.push(key);
            }
        }
        Ok(report)
    }
}
