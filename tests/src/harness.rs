//! # Test Harness
//!
//! [`TestNode`] assembles the subsystems of one DAL node around an in-memory
//! store and a [`MemoryHub`] transport, wired with the same bridges the
//! runtime uses. Delivery is driven explicitly with [`MemoryHub::run_until_idle`].
//!
//! Outside a Tokio runtime, amplification runs inline in the shard sink, so
//! every scenario is deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;

use dal_01_cryptobox::{Cryptobox, CryptoboxParameters, EncodedSlot};
use dal_02_shard_store::{ShardStoreApi, ShardStoreService, StoreConfig};
use dal_03_slot_tracker::{SlotTrackerApi, SlotTrackerService, TrackerConfig, TransitionReport};
use dal_04_gossip::adapters::MemoryHub;
use dal_04_gossip::{GossipApi, GossipConfig, GossipService};
use dal_05_topic_membership::{MembershipConfig, MembershipService, TopicMembershipApi};
use dal_06_amplification::{AmplificationApi, Amplifier};
use dal_07_attestation::{
    AttestationApi, AttestationResolver, MembershipCommittees, StoreAvailability, TrackerHeaders,
};
use dal_node::adapters::{GossipShardPublisher, GossipSlot, GossipSubscriber, ShardSink, ShardValidator};
use shared_types::{
    AttestationRecord, Committee, DalParameters, FinalizedBlock, InMemoryKVStore, Level, PeerId,
    Profile, PublicKeyHash, PublishedHeader, ShardIndex, SlotIndex,
};

/// Small parameters: 8 shards, any 4 rebuild the slot.
pub fn small_parameters() -> DalParameters {
    DalParameters {
        number_of_slots: 4,
        attestation_lag: 2,
        slot_size: 3_968,
        page_size: 1_984,
        redundancy_factor: 2,
        number_of_shards: 8,
    }
}

pub fn pkh(b: u8) -> PublicKeyHash {
    PublicKeyHash::from_bytes([b; 20])
}

/// Shards split evenly across `attesters`, in order.
pub fn committee(level: Level, parameters: &DalParameters, attesters: &[PublicKeyHash]) -> Committee {
    let per = parameters.number_of_shards / attesters.len();
    let assignments: BTreeMap<PublicKeyHash, Vec<ShardIndex>> = attesters
        .iter()
        .enumerate()
        .map(|(i, pkh)| {
            let start = (i * per) as ShardIndex;
            (*pkh, (start..start + per as ShardIndex).collect())
        })
        .collect();
    Committee::new(level, assignments)
}

pub fn slot_bytes(parameters: &DalParameters, seed: u8) -> Vec<u8> {
    (0..parameters.slot_size)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

pub fn header(slot_index: SlotIndex, commitment: shared_types::Commitment, fee: u64) -> PublishedHeader {
    PublishedHeader {
        slot_index,
        commitment,
        fee,
        op_position: 0,
    }
}

/// Attestation record for `published_level` with the given slots set.
pub fn attestation(
    parameters: &DalParameters,
    published_level: Level,
    attested: &[SlotIndex],
) -> AttestationRecord {
    AttestationRecord {
        published_level,
        attested: (0..parameters.number_of_slots)
            .map(|i| attested.contains(&i))
            .collect(),
    }
}

pub struct TestNode {
    pub peer_id: PeerId,
    pub parameters: DalParameters,
    pub cryptobox: Arc<Cryptobox>,
    pub store: Arc<dyn ShardStoreApi>,
    pub tracker: Arc<dyn SlotTrackerApi>,
    pub membership: Arc<dyn TopicMembershipApi>,
    pub amplifier: Arc<dyn AmplificationApi>,
    pub gossip: Arc<dyn GossipApi>,
    pub publisher: Arc<GossipShardPublisher>,
    pub attestation: Arc<dyn AttestationApi>,
}

impl TestNode {
    pub fn new(
        hub: &Arc<MemoryHub>,
        id: u8,
        parameters: DalParameters,
        retention_period: Level,
        profiles: Vec<Profile>,
    ) -> Self {
        let peer_id = PeerId::new([id; 32]);
        let lag = parameters.attestation_lag;
        let cryptobox = Arc::new(Cryptobox::new(CryptoboxParameters::from(&parameters)).unwrap());

        let store: Arc<dyn ShardStoreApi> = Arc::new(ShardStoreService::new(
            InMemoryKVStore::new(),
            cryptobox.clone(),
            StoreConfig { retention_period },
        ));
        let tracker: Arc<dyn SlotTrackerApi> = Arc::new(
            SlotTrackerService::open(
                InMemoryKVStore::new(),
                TrackerConfig::from_parameters(&parameters, retention_period),
            )
            .unwrap(),
        );

        let slot = Arc::new(GossipSlot::new());
        let membership: Arc<dyn TopicMembershipApi> = Arc::new(
            MembershipService::open(
                InMemoryKVStore::new(),
                MembershipConfig {
                    number_of_slots: parameters.number_of_slots,
                    committee_history: 16,
                    attestation_lag: lag,
                },
                Arc::new(GossipSubscriber(slot.clone())),
            )
            .unwrap(),
        );
        let publisher = Arc::new(GossipShardPublisher::new(slot.clone(), membership.clone(), lag));
        let amplifier: Arc<dyn AmplificationApi> = Arc::new(Amplifier::new(
            cryptobox.clone(),
            store.clone(),
            publisher.clone(),
        ));

        let gossip: Arc<dyn GossipApi> = Arc::new(
            GossipService::new(peer_id, GossipConfig::for_testing(), hub.transport(peer_id))
                .with_validator(Arc::new(ShardValidator::new(
                    membership.clone(),
                    tracker.clone(),
                    cryptobox.clone(),
                    lag,
                )))
                .with_sink(Arc::new(ShardSink::new(
                    store.clone(),
                    membership.clone(),
                    amplifier.clone(),
                    lag,
                ))),
        );
        slot.fill(gossip.clone());
        hub.register(peer_id, &gossip);

        let attestation: Arc<dyn AttestationApi> = Arc::new(AttestationResolver::new(
            parameters,
            Arc::new(MembershipCommittees(membership.clone())),
            Arc::new(TrackerHeaders(tracker.clone())),
            Arc::new(StoreAvailability(store.clone())),
        ));

        if !profiles.is_empty() {
            membership.add_profiles(profiles).unwrap();
        }

        Self {
            peer_id,
            parameters,
            cryptobox,
            store,
            tracker,
            membership,
            amplifier,
            gossip,
            publisher,
            attestation,
        }
    }

    /// Apply a finalized block the way the node's block consumer does.
    pub fn finalize(&self, block: &FinalizedBlock) -> TransitionReport {
        let report = self.tracker.on_finalized_block(block).unwrap();
        self.membership.on_finalized_block(block).unwrap();
        if let Some(attested_level) = report.attested_level {
            for header in &report.attested {
                self.store
                    .set_attested_level(&header.commitment, attested_level)
                    .unwrap();
            }
        }
        report
    }

    /// Commit `slot` and store every shard locally.
    pub fn post_slot(&self, slot: &[u8]) -> EncodedSlot {
        let encoded = self.cryptobox.commit_slot(slot).unwrap();
        self.store.put_slot(&encoded).unwrap();
        encoded
    }

    pub fn shard_count(&self, commitment: &shared_types::Commitment) -> usize {
        self.store.count(commitment).unwrap()
    }
}

/// Finalized block carrying `committees` and nothing else.
pub fn empty_block(level: Level, committees: Vec<Committee>) -> FinalizedBlock {
    FinalizedBlock {
        level,
        headers: vec![],
        attestation: None,
        committees,
    }
}

/// Connect every pair, then run heartbeats until meshes settle.
pub fn mesh_up(hub: &MemoryHub, nodes: &[&TestNode]) {
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            hub.connect(a.peer_id, b.peer_id);
        }
    }
    hub.run_until_idle();
    for _ in 0..3 {
        for node in nodes {
            node.gossip.heartbeat();
        }
        hub.run_until_idle();
    }
}
