//! # Slot Tracker Service
//!
//! Owns the [`HeaderTable`] and its persisted copy. The table lock is held
//! across plan, persist and apply, which serializes block processing.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shared_bus::{DalEvent, EventSink, NoopSink};
use shared_types::{
    BatchOperation, Commitment, FinalizedBlock, HeaderStatus, KeyValueStore, Level, SlotHeader,
    SlotIndex,
};
use tracing::{debug, info};

use crate::domain::keys;
use crate::domain::{HeaderTable, TrackerConfig, TransitionReport};
use crate::error::{TrackerError, TrackerResult};
use crate::ports::inbound::SlotTrackerApi;

pub struct SlotTrackerService<KV: KeyValueStore> {
    table: RwLock<HeaderTable>,
    kv: Mutex<KV>,
    config: TrackerConfig,
    events: Arc<dyn EventSink>,
}

impl<KV: KeyValueStore> SlotTrackerService<KV> {
    /// Load the persisted header table.
    pub fn open(kv: KV, config: TrackerConfig) -> TrackerResult<Self> {
        let mut table = HeaderTable::new();

        for (key, value) in kv.prefix_scan(keys::HEADER)? {
            let header: SlotHeader = bincode::deserialize(&value).map_err(|e| {
                TrackerError::Corrupted(format!("header {}: {e}", String::from_utf8_lossy(&key)))
            })?;
            table.insert_header(header);
        }
        for (key, _) in kv.prefix_scan(keys::INTENT)? {
            let (level, slot, commitment) = keys::parse_intent_key(&key)
                .ok_or_else(|| TrackerError::Corrupted("malformed intent key".into()))?;
            table.insert_intent(level, slot, commitment);
        }
        if let Some(bytes) = kv.get(keys::LAST_LEVEL)? {
            let bytes: [u8; 4] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| TrackerError::Corrupted("last level".into()))?;
            table.set_last_level(Some(Level::from_be_bytes(bytes)));
        }

        info!(
            headers = table.len(),
            last_level = ?table.last_level(),
            "[dal-03] Slot tracker loaded"
        );
        Ok(Self {
            table: RwLock::new(table),
            kv: Mutex::new(kv),
            config,
            events: Arc::new(NoopSink),
        })
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn encode(header: &SlotHeader) -> TrackerResult<Vec<u8>> {
        bincode::serialize(header).map_err(|e| TrackerError::Corrupted(e.to_string()))
    }

    fn emit_status(&self, header: &SlotHeader) {
        self.events.emit(DalEvent::HeaderStatusChanged {
            published_level: header.published_level,
            slot_index: header.slot_index,
            commitment: header.commitment,
            status: header.status,
        });
    }
}

impl<KV: KeyValueStore> SlotTrackerApi for SlotTrackerService<KV> {
    fn on_finalized_block(&self, block: &FinalizedBlock) -> TrackerResult<TransitionReport> {
        let mut table = self.table.write();
        let plan = table.plan_block(block, &self.config)?;

        let mut ops = Vec::with_capacity(plan.upserts.len() + plan.promoted_intents.len() + 1);
        for header in &plan.upserts {
            ops.push(BatchOperation::put(
                keys::header_key(header.published_level, header.slot_index, &header.commitment),
                Self::encode(header)?,
            ));
        }
        for (level, slot, commitment) in &plan.promoted_intents {
            ops.push(BatchOperation::delete(keys::intent_key(*level, *slot, commitment)));
        }
        ops.push(BatchOperation::put(
            keys::LAST_LEVEL.to_vec(),
            block.level.to_be_bytes().to_vec(),
        ));
        self.kv.lock().atomic_batch_write(ops)?;

        table.apply(&plan);
        drop(table);

        for header in plan.report.changes() {
            self.emit_status(header);
        }
        self.events.emit(DalEvent::LevelFinalized { level: block.level });
        debug!(
            level = block.level,
            selected = plan.report.selected.len(),
            not_selected = plan.report.not_selected.len(),
            attested = plan.report.attested.len(),
            unattested = plan.report.unattested.len(),
            "[dal-03] Finalized level processed"
        );
        Ok(plan.report)
    }

    fn record_publish_intent(
        &self,
        commitment: Commitment,
        level: Level,
        slot_index: SlotIndex,
    ) -> TrackerResult<bool> {
        if slot_index >= self.config.number_of_slots {
            return Err(TrackerError::InvalidSlotIndex {
                slot_index,
                number_of_slots: self.config.number_of_slots,
            });
        }

        let mut table = self.table.write();
        let finalized = table
            .headers_at(level, slot_index)
            .iter()
            .any(|h| h.commitment == commitment);
        if finalized || table.has_intent(level, slot_index, &commitment) {
            return Ok(false);
        }

        self.kv
            .lock()
            .put(&keys::intent_key(level, slot_index, &commitment), &[])?;
        table.insert_intent(level, slot_index, commitment);
        drop(table);

        self.events.emit(DalEvent::HeaderStatusChanged {
            published_level: level,
            slot_index,
            commitment,
            status: HeaderStatus::Unseen,
        });
        Ok(true)
    }

    /// The selected header wins. Otherwise the latest publish intent is
    /// returned, even after `level` finalized without including it, so a
    /// result here does not mean the commitment made it on L1. Check
    /// `status_of` for `Unseen` to tell the two apart.
    fn commitment_at(&self, level: Level, slot_index: SlotIndex) -> Option<Commitment> {
        let table = self.table.read();
        table
            .selected(level, slot_index)
            .map(|h| h.commitment)
            .or_else(|| table.intents_at(level, slot_index).last().copied())
    }

    fn status_of(&self, level: Level, slot_index: SlotIndex) -> Option<HeaderStatus> {
        let table = self.table.read();
        match table.selected(level, slot_index) {
            Some(header) => Some(header.status),
            None if !table.intents_at(level, slot_index).is_empty() => Some(HeaderStatus::Unseen),
            None => None,
        }
    }

    fn selected_header(&self, level: Level, slot_index: SlotIndex) -> Option<SlotHeader> {
        self.table.read().selected(level, slot_index).cloned()
    }

    fn headers_of(&self, commitment: &Commitment) -> Vec<SlotHeader> {
        self.table.read().headers_of(commitment)
    }

    fn last_processed_level(&self) -> Option<Level> {
        self.table.read().last_level()
    }

    fn gc(&self, current_level: Level) -> TrackerResult<usize> {
        let mut table = self.table.write();
        let expired = table.expired(current_level, &self.config);
        if expired.is_empty() {
            return Ok(0);
        }
        let ops: Vec<BatchOperation> = expired
            .headers
            .iter()
            .map(|(l, s, c)| BatchOperation::delete(keys::header_key(*l, *s, c)))
            .chain(
                expired
                    .intents
                    .iter()
                    .map(|(l, s, c)| BatchOperation::delete(keys::intent_key(*l, *s, c))),
            )
            .collect();
        let removed = ops.len();
        self.kv.lock().atomic_batch_write(ops)?;
        table.remove_expired(&expired);
        info!(level = current_level, removed, "[dal-03] Expired headers removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AttestationRecord, InMemoryKVStore, PublishedHeader};

    fn config() -> TrackerConfig {
        TrackerConfig {
            number_of_slots: 4,
            attestation_lag: 2,
            retention_period: 5,
        }
    }

    fn commitment(b: u8) -> Commitment {
        Commitment([b; 32])
    }

    fn published(slot_index: SlotIndex, c: u8, fee: u64, op_position: u32) -> PublishedHeader {
        PublishedHeader {
            slot_index,
            commitment: commitment(c),
            fee,
            op_position,
        }
    }

    fn block(level: Level, headers: Vec<PublishedHeader>) -> FinalizedBlock {
        FinalizedBlock {
            level,
            headers,
            ..FinalizedBlock::default()
        }
    }

    fn attesting(level: Level, published_level: Level, attested: Vec<bool>) -> FinalizedBlock {
        FinalizedBlock {
            level,
            attestation: Some(AttestationRecord {
                published_level,
                attested,
            }),
            ..FinalizedBlock::default()
        }
    }

    /// KV store whose batch writes always fail.
    struct MockFailingKV;

    impl KeyValueStore for MockFailingKV {
        fn get(&self, _: &[u8]) -> Result<Option<Vec<u8>>, shared_types::KVStoreError> {
            Ok(None)
        }
        fn put(&self, _: &[u8], _: &[u8]) -> Result<(), shared_types::KVStoreError> {
            Err(shared_types::KVStoreError::io("disk full"))
        }
        fn delete(&self, _: &[u8]) -> Result<(), shared_types::KVStoreError> {
            Ok(())
        }
        fn atomic_batch_write(
            &self,
            _: Vec<BatchOperation>,
        ) -> Result<(), shared_types::KVStoreError> {
            Err(shared_types::KVStoreError::io("disk full"))
        }
        fn prefix_scan(&self, _: &[u8]) -> Result<shared_types::ScanResult, shared_types::KVStoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_fee_competition_then_attestation() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        let report = tracker
            .on_finalized_block(&block(100, vec![published(2, 1, 1200, 0), published(2, 2, 1500, 1)]))
            .unwrap();
        assert_eq!(report.selected.len(), 1);
        assert_eq!(report.selected[0].commitment, commitment(2));
        assert_eq!(report.not_selected[0].commitment, commitment(1));
        assert_eq!(tracker.status_of(100, 2), Some(HeaderStatus::WaitingAttestation));
        assert_eq!(tracker.commitment_at(100, 2), Some(commitment(2)));

        tracker.on_finalized_block(&block(101, vec![])).unwrap();
        let report = tracker
            .on_finalized_block(&attesting(102, 100, vec![false, false, true, false]))
            .unwrap();
        assert_eq!(report.attested.len(), 1);
        assert_eq!(report.attested_level, Some(102));
        assert_eq!(tracker.status_of(100, 2), Some(HeaderStatus::Attested));

        let loser = tracker.headers_of(&commitment(1));
        assert_eq!(loser[0].status, HeaderStatus::NotSelected);
    }

    #[test]
    fn test_unattested_when_bit_missing() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        tracker
            .on_finalized_block(&block(10, vec![published(0, 1, 1, 0)]))
            .unwrap();
        let report = tracker.on_finalized_block(&attesting(12, 10, vec![])).unwrap();
        assert_eq!(report.unattested.len(), 1);
        assert_eq!(tracker.status_of(10, 0), Some(HeaderStatus::Unattested));
    }

    #[test]
    fn test_terminal_statuses_never_change() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        tracker
            .on_finalized_block(&block(10, vec![published(1, 1, 5, 0), published(1, 2, 1, 1)]))
            .unwrap();
        tracker
            .on_finalized_block(&attesting(12, 10, vec![false, true]))
            .unwrap();
        // A second record for the same published level changes nothing.
        let report = tracker
            .on_finalized_block(&attesting(13, 10, vec![false, false]))
            .unwrap();
        assert_eq!(report.changes().count(), 0);
        assert_eq!(tracker.status_of(10, 1), Some(HeaderStatus::Attested));
        assert_eq!(tracker.headers_of(&commitment(2))[0].status, HeaderStatus::NotSelected);
    }

    #[test]
    fn test_non_monotonic_level_rejected() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        tracker.on_finalized_block(&block(5, vec![])).unwrap();
        assert_eq!(
            tracker.on_finalized_block(&block(5, vec![published(0, 1, 1, 0)])),
            Err(TrackerError::NonMonotonicLevel {
                last: 5,
                received: 5
            })
        );
        assert_eq!(tracker.status_of(5, 0), None);
    }

    #[test]
    fn test_unknown_coordinates_are_absent() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        assert_eq!(tracker.commitment_at(1, 1), None);
        assert_eq!(tracker.status_of(1, 1), None);
        assert!(tracker.headers_of(&commitment(9)).is_empty());
    }

    #[test]
    fn test_publish_intent_is_idempotent_and_promoted() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        assert!(tracker.record_publish_intent(commitment(3), 20, 1).unwrap());
        assert!(!tracker.record_publish_intent(commitment(3), 20, 1).unwrap());
        assert_eq!(tracker.status_of(20, 1), Some(HeaderStatus::Unseen));
        assert_eq!(tracker.commitment_at(20, 1), Some(commitment(3)));
        assert!(tracker.selected_header(20, 1).is_none());

        tracker
            .on_finalized_block(&block(20, vec![published(1, 3, 10, 0)]))
            .unwrap();
        let headers = tracker.headers_of(&commitment(3));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].status, HeaderStatus::WaitingAttestation);
    }

    #[test]
    fn test_intent_survives_level_finalized_without_header() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        tracker.record_publish_intent(commitment(6), 30, 2).unwrap();
        tracker.on_finalized_block(&block(30, vec![])).unwrap();
        tracker.on_finalized_block(&block(31, vec![])).unwrap();

        assert_eq!(tracker.commitment_at(30, 2), Some(commitment(6)));
        assert_eq!(tracker.status_of(30, 2), Some(HeaderStatus::Unseen));
        assert!(tracker.selected_header(30, 2).is_none());
    }

    #[test]
    fn test_intent_slot_index_validated() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        assert!(matches!(
            tracker.record_publish_intent(commitment(1), 1, 4),
            Err(TrackerError::InvalidSlotIndex { .. })
        ));
    }

    #[test]
    fn test_state_survives_reopen() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        tracker
            .on_finalized_block(&block(7, vec![published(3, 4, 1, 0)]))
            .unwrap();
        tracker.record_publish_intent(commitment(5), 9, 0).unwrap();
        let kv = tracker.kv.into_inner();

        let reopened = SlotTrackerService::open(kv, config()).unwrap();
        assert_eq!(reopened.last_processed_level(), Some(7));
        assert_eq!(reopened.status_of(7, 3), Some(HeaderStatus::WaitingAttestation));
        assert_eq!(reopened.status_of(9, 0), Some(HeaderStatus::Unseen));
    }

    #[test]
    fn test_failed_persist_leaves_state_unchanged() {
        let tracker = SlotTrackerService::open(MockFailingKV, config()).unwrap();
        assert!(matches!(
            tracker.on_finalized_block(&block(1, vec![published(0, 1, 1, 0)])),
            Err(TrackerError::Storage(_))
        ));
        assert_eq!(tracker.last_processed_level(), None);
        assert_eq!(tracker.status_of(1, 0), None);
    }

    #[test]
    fn test_gc_window() {
        let tracker = SlotTrackerService::open(InMemoryKVStore::new(), config()).unwrap();
        tracker
            .on_finalized_block(&block(10, vec![published(0, 1, 1, 0)]))
            .unwrap();
        // attested point 12, retention 5: kept through 17
        assert_eq!(tracker.gc(17).unwrap(), 0);
        assert!(tracker.commitment_at(10, 0).is_some());
        assert_eq!(tracker.gc(18).unwrap(), 1);
        assert!(tracker.commitment_at(10, 0).is_none());
    }
}
