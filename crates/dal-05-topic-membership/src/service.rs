//! # Membership Service
//!
//! Keeps the joined topic set equal to `desired_topics(profiles, committees)`.
//! Every change of either input ends in [`MembershipService::reconcile`],
//! which runs under the `joined` lock so two reconciliations never interleave
//! their join/leave calls.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shared_types::{Committee, FinalizedBlock, KeyValueStore, Level, Profile, Topic};
use tracing::{debug, info};

use crate::adapters::ProfileStore;
use crate::domain::{
    desired_topics, normalize_profiles, CommitteeTable, MembershipConfig, MembershipDiff,
    MembershipResult,
};
use crate::ports::inbound::TopicMembershipApi;
use crate::ports::outbound::TopicSubscriber;

pub struct MembershipService<KV: KeyValueStore> {
    config: MembershipConfig,
    profiles: RwLock<Vec<Profile>>,
    store: Mutex<ProfileStore<KV>>,
    committees: CommitteeTable,
    current_level: RwLock<Option<Level>>,
    joined: Mutex<BTreeSet<Topic>>,
    subscriber: Arc<dyn TopicSubscriber>,
}

impl<KV: KeyValueStore> MembershipService<KV> {
    /// Load persisted profiles. Nothing is joined until the first
    /// reconciliation.
    pub fn open(kv: KV, config: MembershipConfig, subscriber: Arc<dyn TopicSubscriber>) -> MembershipResult<Self> {
        let store = ProfileStore::new(kv);
        let profiles = match store.load()? {
            Some(saved) => normalize_profiles(saved, config.number_of_slots)?,
            None => Vec::new(),
        };
        info!(profiles = ?profiles, "[dal-05] Profiles loaded");
        Ok(Self {
            config,
            profiles: RwLock::new(profiles),
            store: Mutex::new(store),
            committees: CommitteeTable::new(),
            current_level: RwLock::new(None),
            joined: Mutex::new(BTreeSet::new()),
            subscriber,
        })
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    pub fn committees(&self) -> &CommitteeTable {
        &self.committees
    }

    /// Join and leave until the joined set matches the current inputs.
    pub fn reconcile(&self) -> MembershipDiff {
        let mut joined = self.joined.lock();
        let desired = {
            let profiles = self.profiles.read();
            let relevant = self
                .current_level
                .read()
                .map(|level| {
                    self.committees
                        .relevant(level.saturating_add(self.config.attestation_lag))
                })
                .unwrap_or_default();
            desired_topics(
                &profiles,
                relevant.iter().map(Arc::as_ref),
                self.config.number_of_slots,
            )
        };

        let diff = MembershipDiff {
            joined: desired.difference(&joined).copied().collect(),
            left: joined.difference(&desired).copied().collect(),
        };
        for topic in &diff.left {
            self.subscriber.leave(*topic);
        }
        for topic in &diff.joined {
            self.subscriber.join(*topic);
        }
        *joined = desired;

        if !diff.is_empty() {
            debug!(
                joined = diff.joined.len(),
                left = diff.left.len(),
                total = joined.len(),
                "[dal-05] Topics reconciled"
            );
        }
        diff
    }

    fn apply_profiles(&self, profiles: Vec<Profile>) -> MembershipResult<MembershipDiff> {
        let profiles = normalize_profiles(profiles, self.config.number_of_slots)?;
        {
            let store = self.store.lock();
            store.save(&profiles)?;
            *self.profiles.write() = profiles.clone();
        }
        info!(profiles = ?profiles, "[dal-05] Profiles updated");
        Ok(self.reconcile())
    }
}

impl<KV: KeyValueStore> TopicMembershipApi for MembershipService<KV> {
    fn on_finalized_block(&self, block: &FinalizedBlock) -> MembershipResult<MembershipDiff> {
        for committee in &block.committees {
            self.committees.install(committee.clone());
        }
        *self.current_level.write() = Some(block.level);
        let dropped = self
            .committees
            .prune_below(block.level.saturating_sub(self.config.committee_history));
        if dropped > 0 {
            debug!(level = block.level, dropped, "[dal-05] Old committees dropped");
        }
        Ok(self.reconcile())
    }

    fn set_profiles(&self, profiles: Vec<Profile>) -> MembershipResult<MembershipDiff> {
        self.apply_profiles(profiles)
    }

    fn add_profiles(&self, profiles: Vec<Profile>) -> MembershipResult<MembershipDiff> {
        let mut merged = self.profiles.read().clone();
        merged.extend(profiles);
        self.apply_profiles(merged)
    }

    fn profiles(&self) -> Vec<Profile> {
        self.profiles.read().clone()
    }

    fn committee(&self, level: Level) -> Option<Arc<Committee>> {
        self.committees.get(level)
    }

    fn joined_topics(&self) -> Vec<Topic> {
        self.joined.lock().iter().copied().collect()
    }

    fn current_level(&self) -> Option<Level> {
        *self.current_level.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MembershipError;
    use shared_types::{
        BatchOperation, InMemoryKVStore, KVStoreError, PublicKeyHash, ScanResult,
    };
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct RecordingSubscriber {
        joined: Mutex<BTreeSet<Topic>>,
        calls: Mutex<Vec<(&'static str, Topic)>>,
    }

    impl TopicSubscriber for RecordingSubscriber {
        fn join(&self, topic: Topic) -> bool {
            self.calls.lock().push(("join", topic));
            self.joined.lock().insert(topic)
        }

        fn leave(&self, topic: Topic) -> bool {
            self.calls.lock().push(("leave", topic));
            self.joined.lock().remove(&topic)
        }
    }

    /// Store shared between two service instances, to simulate a restart.
    #[derive(Clone, Default)]
    struct SharedKV(Arc<InMemoryKVStore>);

    impl KeyValueStore for SharedKV {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
            self.0.get(key)
        }
        fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
            self.0.put(key, value)
        }
        fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
            self.0.delete(key)
        }
        fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
            self.0.atomic_batch_write(operations)
        }
        fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
            self.0.prefix_scan(prefix)
        }
    }

    struct MockFailingKV;

    impl KeyValueStore for MockFailingKV {
        fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
            Ok(None)
        }
        fn put(&self, _key: &[u8], _value: &[u8]) -> Result<(), KVStoreError> {
            Err(KVStoreError::io("disk full"))
        }
        fn delete(&self, _key: &[u8]) -> Result<(), KVStoreError> {
            Ok(())
        }
        fn atomic_batch_write(&self, _operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
            Err(KVStoreError::io("disk full"))
        }
        fn prefix_scan(&self, _prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
            Ok(Vec::new())
        }
    }

    fn pkh(b: u8) -> PublicKeyHash {
        PublicKeyHash::from_bytes([b; 20])
    }

    fn config() -> MembershipConfig {
        MembershipConfig {
            number_of_slots: 4,
            committee_history: 3,
            attestation_lag: 0,
        }
    }

    fn block(level: Level, committees: &[(Level, &[u8])]) -> FinalizedBlock {
        FinalizedBlock {
            level,
            committees: committees
                .iter()
                .map(|(l, members)| {
                    let assignments: BTreeMap<_, _> = members
                        .iter()
                        .enumerate()
                        .map(|(i, m)| (pkh(*m), vec![i as u16]))
                        .collect();
                    Committee::new(*l, assignments)
                })
                .collect(),
            ..FinalizedBlock::default()
        }
    }

    fn service() -> (MembershipService<InMemoryKVStore>, Arc<RecordingSubscriber>) {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let service =
            MembershipService::open(InMemoryKVStore::new(), config(), subscriber.clone()).unwrap();
        (service, subscriber)
    }

    #[test]
    fn test_observer_joins_committee_topics() {
        let (service, subscriber) = service();
        service.set_profiles(vec![Profile::Observer(1)]).unwrap();
        assert!(service.joined_topics().is_empty());

        let diff = service
            .on_finalized_block(&block(10, &[(10, &[1, 2]), (11, &[2, 3])]))
            .unwrap();
        assert_eq!(diff.joined.len(), 3);
        assert_eq!(subscriber.joined.lock().len(), 3);
    }

    #[test]
    fn test_committee_rotation_leaves_old_members() {
        let (service, subscriber) = service();
        service.set_profiles(vec![Profile::Observer(0)]).unwrap();
        service.on_finalized_block(&block(10, &[(10, &[1]), (11, &[2])])).unwrap();

        let diff = service.on_finalized_block(&block(11, &[(12, &[3])])).unwrap();
        assert_eq!(diff.left, vec![Topic::new(0, pkh(1))]);
        assert_eq!(diff.joined, vec![Topic::new(0, pkh(3))]);
        let joined: Vec<Topic> = subscriber.joined.lock().iter().copied().collect();
        assert_eq!(joined, vec![Topic::new(0, pkh(2)), Topic::new(0, pkh(3))]);
    }

    #[test]
    fn test_membership_is_pure_function_of_inputs() {
        let (a, _) = service();
        let (b, _) = service();
        a.set_profiles(vec![Profile::Producer(2), Profile::Attester(pkh(9))]).unwrap();
        a.on_finalized_block(&block(5, &[(5, &[1, 2]), (6, &[4])])).unwrap();

        b.on_finalized_block(&block(4, &[(5, &[1, 2]), (6, &[4])])).unwrap();
        b.on_finalized_block(&block(5, &[])).unwrap();
        b.set_profiles(vec![Profile::Attester(pkh(9)), Profile::Producer(2)]).unwrap();

        assert_eq!(a.joined_topics(), b.joined_topics());
    }

    #[test]
    fn test_attester_joins_without_committee() {
        let (service, _) = service();
        let diff = service.set_profiles(vec![Profile::Attester(pkh(1))]).unwrap();
        assert_eq!(diff.joined.len(), 4);
    }

    #[test]
    fn test_switching_to_bootstrap_leaves_everything() {
        let (service, subscriber) = service();
        service.set_profiles(vec![Profile::Attester(pkh(1))]).unwrap();
        let diff = service.set_profiles(vec![Profile::Bootstrap]).unwrap();
        assert_eq!(diff.left.len(), 4);
        assert!(subscriber.joined.lock().is_empty());
    }

    #[test]
    fn test_add_profiles_rejects_bootstrap_mix() {
        let (service, _) = service();
        service.set_profiles(vec![Profile::Observer(0)]).unwrap();
        assert_eq!(
            service.add_profiles(vec![Profile::Bootstrap]),
            Err(MembershipError::BootstrapNotExclusive)
        );
        assert_eq!(service.profiles(), vec![Profile::Observer(0)]);
    }

    #[test]
    fn test_add_profiles_merges() {
        let (service, _) = service();
        service.set_profiles(vec![Profile::Observer(0)]).unwrap();
        service.add_profiles(vec![Profile::Producer(1), Profile::Observer(0)]).unwrap();
        assert_eq!(
            service.profiles(),
            vec![Profile::Producer(1), Profile::Observer(0)]
        );
    }

    #[test]
    fn test_profiles_survive_restart() {
        let kv = SharedKV::default();
        let subscriber = Arc::new(RecordingSubscriber::default());
        {
            let service = MembershipService::open(kv.clone(), config(), subscriber.clone()).unwrap();
            service.set_profiles(vec![Profile::Observer(3)]).unwrap();
        }
        let reopened = MembershipService::open(kv, config(), subscriber).unwrap();
        assert_eq!(reopened.profiles(), vec![Profile::Observer(3)]);
    }

    #[test]
    fn test_failed_persist_keeps_previous_profiles() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let service = MembershipService::open(MockFailingKV, config(), subscriber.clone()).unwrap();
        assert!(matches!(
            service.set_profiles(vec![Profile::Attester(pkh(1))]),
            Err(MembershipError::Storage(_))
        ));
        assert!(service.profiles().is_empty());
        assert!(subscriber.calls.lock().is_empty());
    }

    #[test]
    fn test_lag_selects_attesting_committee() {
        let subscriber = Arc::new(RecordingSubscriber::default());
        let config = MembershipConfig {
            attestation_lag: 2,
            ..config()
        };
        let service = MembershipService::open(InMemoryKVStore::new(), config, subscriber).unwrap();
        service.set_profiles(vec![Profile::Observer(0)]).unwrap();

        let diff = service
            .on_finalized_block(&block(10, &[(10, &[1]), (12, &[2])]))
            .unwrap();
        assert_eq!(diff.joined, vec![Topic::new(0, pkh(2))]);
    }

    #[test]
    fn test_old_committees_pruned() {
        let (service, _) = service();
        service.on_finalized_block(&block(1, &[(1, &[1]), (2, &[1])])).unwrap();
        service.on_finalized_block(&block(10, &[(10, &[1])])).unwrap();
        assert!(service.committee(1).is_none());
        assert!(service.committee(10).is_some());
        assert_eq!(service.current_level(), Some(10));
    }
}
