//! # Amplifier
//!
//! Once a commitment holds `threshold` shards, rebuild every shard and push
//! the missing ones back into the store and onto the overlay. The table lock
//! is held only to admit or finish an attempt, never across reconstruction
//! or publication.

use std::collections::BTreeSet;
use std::sync::Arc;

use dal_01_cryptobox::Cryptobox;
use dal_02_shard_store::{PutOutcome, ShardStoreApi};
use parking_lot::Mutex;
use shared_bus::{DalEvent, EventSink, NoopSink};
use shared_types::{Commitment, Level, ShardIndex, SlotIndex};
use tracing::{debug, info, warn};

use crate::domain::{
    Admission, AmplificationError, AmplificationOutcome, AmplificationResult, AmplificationStatus,
    AmplificationTable,
};
use crate::ports::inbound::AmplificationApi;
use crate::ports::outbound::ShardPublisher;

pub struct Amplifier {
    cryptobox: Arc<Cryptobox>,
    store: Arc<dyn ShardStoreApi>,
    publisher: Arc<dyn ShardPublisher>,
    table: Mutex<AmplificationTable>,
    events: Arc<dyn EventSink>,
}

impl Amplifier {
    pub fn new(
        cryptobox: Arc<Cryptobox>,
        store: Arc<dyn ShardStoreApi>,
        publisher: Arc<dyn ShardPublisher>,
    ) -> Self {
        Self {
            cryptobox,
            store,
            publisher,
            table: Mutex::new(AmplificationTable::new()),
            events: Arc::new(NoopSink),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn threshold(&self) -> usize {
        self.cryptobox.reconstruction_threshold()
    }

    fn missing_indices(&self, commitment: &Commitment) -> AmplificationResult<BTreeSet<ShardIndex>> {
        let held: BTreeSet<ShardIndex> = self.store.shard_indices(commitment)?.into_iter().collect();
        Ok((0..self.cryptobox.number_of_shards() as ShardIndex)
            .filter(|i| !held.contains(i))
            .collect())
    }

    fn amplify(
        &self,
        commitment: Commitment,
        level: Level,
        slot_index: SlotIndex,
    ) -> AmplificationResult<AmplificationOutcome> {
        if self.missing_indices(&commitment)?.is_empty() {
            self.table.lock().finish(&commitment, AmplificationStatus::Done);
            return Ok(AmplificationOutcome::NoMissingShard);
        }

        let held = self.store.shards_of(&commitment)?;
        let encoded = match self.cryptobox.reconstruct_shards(&commitment, &held) {
            Ok(encoded) => encoded,
            Err(e) => {
                let reason = e.to_string();
                warn!(
                    commitment = %commitment,
                    held = held.len(),
                    error = %reason,
                    "[dal-06] Reconstruction failed; waiting for more shards"
                );
                self.table
                    .lock()
                    .finish(&commitment, AmplificationStatus::Failed { held: held.len() });
                self.events.emit(DalEvent::AmplificationFailed {
                    commitment,
                    reason: reason.clone(),
                });
                return Ok(AmplificationOutcome::Failed { reason });
            }
        };

        // Shards may have arrived while reconstructing.
        let missing = self.missing_indices(&commitment)?;
        if missing.is_empty() {
            self.table.lock().finish(&commitment, AmplificationStatus::Done);
            debug!(commitment = %commitment, "[dal-06] All shards arrived during reconstruction");
            return Ok(AmplificationOutcome::NoMissingShard);
        }

        let mut republished = 0;
        for shard in encoded.shards.into_iter().filter(|s| missing.contains(&s.index)) {
            if self.store.put(shard.clone())? == PutOutcome::AlreadyStored {
                continue;
            }
            match self.publisher.publish(level, slot_index, &shard) {
                Ok(()) => republished += 1,
                Err(reason) => warn!(
                    commitment = %commitment,
                    shard_index = shard.index,
                    reason = %reason,
                    "[dal-06] Failed to publish reconstructed shard"
                ),
            }
        }

        self.table.lock().finish(&commitment, AmplificationStatus::Done);
        info!(
            commitment = %commitment,
            level,
            slot_index,
            republished,
            "[dal-06] Amplification completed"
        );
        self.events.emit(DalEvent::AmplificationCompleted {
            commitment,
            republished,
        });
        Ok(AmplificationOutcome::Amplified { republished })
    }
}

impl AmplificationApi for Amplifier {
    fn on_shard_received(
        &self,
        commitment: Commitment,
        level: Level,
        slot_index: SlotIndex,
    ) -> AmplificationResult<AmplificationOutcome> {
        let held = self.store.count(&commitment)?;
        let threshold = self.threshold();
        if held < threshold {
            return Ok(AmplificationOutcome::BelowThreshold { held, threshold });
        }

        match self.table.lock().try_begin(commitment, level, held) {
            Admission::Proceed => {}
            Admission::Skip(AmplificationStatus::Done) => {
                return Ok(AmplificationOutcome::AlreadyAmplified)
            }
            Admission::Skip(AmplificationStatus::InProgress) => {
                return Ok(AmplificationOutcome::InProgress)
            }
            Admission::Skip(AmplificationStatus::Failed { held }) => {
                return Ok(AmplificationOutcome::AwaitingNewShards { held })
            }
        }

        debug!(commitment = %commitment, held, threshold, "[dal-06] Amplification started");
        let result = self.amplify(commitment, level, slot_index);
        if let Err(AmplificationError::Store(e)) = &result {
            warn!(commitment = %commitment, error = %e, "[dal-06] Amplification aborted");
            self.table.lock().abort(&commitment);
        }
        result
    }

    fn status(&self, commitment: &Commitment) -> Option<AmplificationStatus> {
        self.table.lock().status(commitment)
    }

    fn forget(&self, commitments: &[Commitment]) {
        let mut table = self.table.lock();
        for commitment in commitments {
            table.forget(commitment);
        }
    }

    fn prune_below(&self, level: Level) -> usize {
        self.table.lock().prune_below(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dal_01_cryptobox::{CryptoboxParameters, EncodedSlot};
    use dal_02_shard_store::{ShardStoreService, ShardVerifier, StoreConfig};
    use shared_types::{InMemoryKVStore, Shard};
    use std::sync::{OnceLock, Weak};

    const SLOT_SIZE: usize = 31 * 64;

    #[derive(Default)]
    struct MockPublisher {
        published: Mutex<Vec<(Level, SlotIndex, ShardIndex)>>,
        fail: bool,
    }

    impl ShardPublisher for MockPublisher {
        fn publish(&self, level: Level, slot_index: SlotIndex, shard: &Shard) -> Result<(), String> {
            if self.fail {
                return Err("overlay down".into());
            }
            self.published.lock().push((level, slot_index, shard.index));
            Ok(())
        }
    }

    /// Triggers the amplifier again from inside a publication.
    #[derive(Default)]
    struct MockReentrantPublisher {
        amplifier: OnceLock<Weak<Amplifier>>,
        nested: Mutex<Vec<AmplificationOutcome>>,
    }

    impl ShardPublisher for MockReentrantPublisher {
        fn publish(&self, level: Level, slot_index: SlotIndex, shard: &Shard) -> Result<(), String> {
            if let Some(amplifier) = self.amplifier.get().and_then(Weak::upgrade) {
                let outcome = amplifier
                    .on_shard_received(shard.commitment, level, slot_index)
                    .map_err(|e| e.to_string())?;
                self.nested.lock().push(outcome);
            }
            Ok(())
        }
    }

    struct MockAcceptAll;

    impl ShardVerifier for MockAcceptAll {
        fn verify(&self, _: &Commitment, _: &Shard) -> Result<(), String> {
            Ok(())
        }
    }

    fn cryptobox() -> Arc<Cryptobox> {
        Arc::new(
            Cryptobox::new(CryptoboxParameters {
                slot_size: SLOT_SIZE,
                page_size: SLOT_SIZE,
                redundancy_factor: 4,
                number_of_shards: 16,
            })
            .unwrap(),
        )
    }

    fn encoded(seed: u8) -> EncodedSlot {
        let slot: Vec<u8> = (0..SLOT_SIZE).map(|i| (i as u8).wrapping_mul(seed) ^ seed).collect();
        cryptobox().commit_slot(&slot).unwrap()
    }

    fn store(verifier: Arc<dyn ShardVerifier>) -> Arc<dyn ShardStoreApi> {
        Arc::new(ShardStoreService::new(
            InMemoryKVStore::new(),
            verifier,
            StoreConfig::default(),
        ))
    }

    fn setup() -> (Amplifier, Arc<dyn ShardStoreApi>, Arc<MockPublisher>) {
        let store = store(cryptobox());
        let publisher = Arc::new(MockPublisher::default());
        let amplifier = Amplifier::new(cryptobox(), store.clone(), publisher.clone());
        (amplifier, store, publisher)
    }

    #[test]
    fn test_below_threshold_does_nothing() {
        let (amplifier, store, publisher) = setup();
        let slot = encoded(3);
        for shard in &slot.shards[..3] {
            store.put(shard.clone()).unwrap();
        }
        assert_eq!(
            amplifier.on_shard_received(slot.commitment, 7, 1).unwrap(),
            AmplificationOutcome::BelowThreshold { held: 3, threshold: 4 }
        );
        assert!(publisher.published.lock().is_empty());
        assert_eq!(amplifier.status(&slot.commitment), None);
    }

    #[test]
    fn test_threshold_rebuilds_and_publishes_missing() {
        let (amplifier, store, publisher) = setup();
        let slot = encoded(5);
        for shard in slot.shards.iter().step_by(4) {
            store.put(shard.clone()).unwrap();
        }

        let outcome = amplifier.on_shard_received(slot.commitment, 7, 1).unwrap();
        assert_eq!(outcome, AmplificationOutcome::Amplified { republished: 12 });
        assert_eq!(store.count(&slot.commitment).unwrap(), 16);
        let published = publisher.published.lock();
        assert_eq!(published.len(), 12);
        assert!(published.iter().all(|(l, s, i)| *l == 7 && *s == 1 && i % 4 != 0));
        for (_, _, index) in published.iter() {
            assert_eq!(store.get(&slot.commitment, *index).unwrap(), slot.shards[*index as usize]);
        }
    }

    #[test]
    fn test_completed_commitment_not_amplified_again() {
        let (amplifier, store, publisher) = setup();
        let slot = encoded(6);
        for shard in &slot.shards[..4] {
            store.put(shard.clone()).unwrap();
        }
        amplifier.on_shard_received(slot.commitment, 7, 0).unwrap();
        assert_eq!(
            amplifier.on_shard_received(slot.commitment, 7, 0).unwrap(),
            AmplificationOutcome::AlreadyAmplified
        );
        assert_eq!(publisher.published.lock().len(), 12);
    }

    #[test]
    fn test_all_shards_held_is_skipped() {
        let (amplifier, store, publisher) = setup();
        let slot = encoded(7);
        store.put_slot(&slot).unwrap();
        assert_eq!(
            amplifier.on_shard_received(slot.commitment, 7, 0).unwrap(),
            AmplificationOutcome::NoMissingShard
        );
        assert!(publisher.published.lock().is_empty());
        assert_eq!(amplifier.status(&slot.commitment), Some(AmplificationStatus::Done));
    }

    #[test]
    fn test_failure_retried_only_on_new_shard() {
        let store = store(Arc::new(MockAcceptAll));
        let publisher = Arc::new(MockPublisher::default());
        let amplifier = Amplifier::new(cryptobox(), store.clone(), publisher.clone());

        let good = encoded(8);
        let other = encoded(9);
        // A shard of another slot relabelled with this commitment.
        let forged = Shard {
            commitment: good.commitment,
            ..other.shards[0].clone()
        };
        store.put(forged).unwrap();
        for shard in &good.shards[1..4] {
            store.put(shard.clone()).unwrap();
        }

        assert!(matches!(
            amplifier.on_shard_received(good.commitment, 3, 0).unwrap(),
            AmplificationOutcome::Failed { .. }
        ));
        assert_eq!(
            amplifier.on_shard_received(good.commitment, 3, 0).unwrap(),
            AmplificationOutcome::AwaitingNewShards { held: 4 }
        );

        store.put(good.shards[4].clone()).unwrap();
        let retried = amplifier.on_shard_received(good.commitment, 3, 0).unwrap();
        assert!(matches!(
            retried,
            AmplificationOutcome::Failed { .. } | AmplificationOutcome::Amplified { .. }
        ));
    }

    #[test]
    fn test_concurrent_trigger_is_coalesced() {
        let store = store(cryptobox());
        let publisher = Arc::new(MockReentrantPublisher::default());
        let amplifier = Arc::new(Amplifier::new(cryptobox(), store.clone(), publisher.clone()));
        publisher.amplifier.set(Arc::downgrade(&amplifier)).unwrap();

        let slot = encoded(10);
        for shard in &slot.shards[..4] {
            store.put(shard.clone()).unwrap();
        }
        assert_eq!(
            amplifier.on_shard_received(slot.commitment, 2, 0).unwrap(),
            AmplificationOutcome::Amplified { republished: 12 }
        );
        let nested = publisher.nested.lock();
        assert_eq!(nested.len(), 12);
        assert!(nested.iter().all(|o| *o == AmplificationOutcome::InProgress));
    }

    #[test]
    fn test_publish_failure_still_stores() {
        let store = store(cryptobox());
        let publisher = Arc::new(MockPublisher {
            fail: true,
            ..MockPublisher::default()
        });
        let amplifier = Amplifier::new(cryptobox(), store.clone(), publisher);
        let slot = encoded(11);
        for shard in &slot.shards[..4] {
            store.put(shard.clone()).unwrap();
        }
        assert_eq!(
            amplifier.on_shard_received(slot.commitment, 2, 0).unwrap(),
            AmplificationOutcome::Amplified { republished: 0 }
        );
        assert_eq!(store.count(&slot.commitment).unwrap(), 16);
    }

    #[test]
    fn test_forget_clears_status() {
        let (amplifier, store, _) = setup();
        let slot = encoded(12);
        store.put_slot(&slot).unwrap();
        amplifier.on_shard_received(slot.commitment, 2, 0).unwrap();
        amplifier.forget(&[slot.commitment]);
        assert_eq!(amplifier.status(&slot.commitment), None);
    }
}
