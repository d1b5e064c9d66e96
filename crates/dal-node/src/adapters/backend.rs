//! [`DalBackend`] over the node's subsystems.

use std::collections::BTreeMap;
use std::sync::Arc;

use dal_01_cryptobox::Cryptobox;
use dal_02_shard_store::ShardStoreApi;
use dal_03_slot_tracker::SlotTrackerApi;
use dal_04_gossip::{ConnectionState, GossipApi, PeerInfo};
use dal_05_topic_membership::TopicMembershipApi;
use dal_07_attestation::AttestationApi;
use dal_08_rpc::{Acl, ApiError, ApiResult, DalBackend, HealthResponse};
use shared_types::{
    Commitment, CommitmentProof, DalParameters, HeaderStatus, Level, PeerId, Profile,
    PublicKeyHash, Shard, ShardIndex, SlotHeader, SlotIndex, Topic,
};
use tracing::info;

use crate::container::SubsystemContainer;

pub struct NodeBackend {
    parameters: DalParameters,
    cryptobox: Arc<Cryptobox>,
    store: Arc<dyn ShardStoreApi>,
    tracker: Arc<dyn SlotTrackerApi>,
    membership: Arc<dyn TopicMembershipApi>,
    gossip: Arc<dyn GossipApi>,
    attestation: Arc<dyn AttestationApi>,
}

impl NodeBackend {
    pub fn new(container: &SubsystemContainer) -> Self {
        Self {
            parameters: container.parameters,
            cryptobox: container.cryptobox.clone(),
            store: container.store.clone(),
            tracker: container.tracker.clone(),
            membership: container.membership.clone(),
            gossip: container.gossip.clone(),
            attestation: container.attestation.clone(),
        }
    }

    fn check_slot_index(&self, slot_index: SlotIndex) -> ApiResult<()> {
        if slot_index >= self.parameters.number_of_slots {
            return Err(ApiError::invalid_parameter(format!(
                "slot index {slot_index} out of range (0..{})",
                self.parameters.number_of_slots
            )));
        }
        Ok(())
    }
}

impl DalBackend for NodeBackend {
    fn post_slot(&self, slot: &[u8]) -> ApiResult<Commitment> {
        let encoded = self.cryptobox.commit_slot(slot)?;
        let stored = self.store.put_slot(&encoded)?;
        // Posted slots that are never published still expire.
        let current = self.tracker.last_processed_level().unwrap_or(0);
        let anchor = self.parameters.attested_level(current);
        self.store.extend_anchor(&encoded.commitment, anchor)?;
        info!(
            commitment = %encoded.commitment,
            shards = stored,
            anchor,
            "[dal-node] Slot committed"
        );
        Ok(encoded.commitment)
    }

    fn publish_intent(&self, commitment: Commitment, level: Level, slot_index: SlotIndex) -> ApiResult<()> {
        self.check_slot_index(slot_index)?;
        // Only slots posted to this node can be published from it.
        self.store.commitment_proof(&commitment)?;
        self.tracker
            .record_publish_intent(commitment, level, slot_index)?;
        self.store
            .extend_anchor(&commitment, self.parameters.attested_level(level))?;
        Ok(())
    }

    fn slot(&self, commitment: &Commitment) -> ApiResult<Vec<u8>> {
        let shards = self.store.shards_of(commitment)?;
        if shards.len() < self.cryptobox.reconstruction_threshold() {
            return Err(ApiError::not_found("slot"));
        }
        Ok(self.cryptobox.reconstruct_slot(commitment, &shards)?)
    }

    fn commitment_proof(&self, commitment: &Commitment) -> ApiResult<CommitmentProof> {
        Ok(self.store.commitment_proof(commitment)?)
    }

    fn headers_of(&self, commitment: &Commitment) -> Vec<SlotHeader> {
        self.tracker.headers_of(commitment)
    }

    fn commitment_at(&self, level: Level, slot_index: SlotIndex) -> Option<Commitment> {
        self.tracker.commitment_at(level, slot_index)
    }

    fn status_at(&self, level: Level, slot_index: SlotIndex) -> Option<HeaderStatus> {
        self.tracker.status_of(level, slot_index)
    }

    fn pages(&self, level: Level, slot_index: SlotIndex) -> ApiResult<(Commitment, Vec<Vec<u8>>)> {
        self.check_slot_index(slot_index)?;
        let commitment = self
            .tracker
            .commitment_at(level, slot_index)
            .ok_or_else(|| ApiError::not_found("commitment"))?;
        let slot = self.slot(&commitment)?;
        Ok((commitment, self.cryptobox.pages(&slot)?))
    }

    fn shard(&self, commitment: &Commitment, shard_index: ShardIndex) -> ApiResult<Shard> {
        Ok(self.store.get(commitment, shard_index)?)
    }

    fn profiles(&self) -> Vec<Profile> {
        self.membership.profiles()
    }

    fn add_profiles(&self, profiles: Vec<Profile>) -> ApiResult<Vec<Profile>> {
        self.membership.add_profiles(profiles)?;
        Ok(self.membership.profiles())
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.gossip.peers()
    }

    fn peer(&self, peer: &PeerId) -> Option<PeerInfo> {
        self.gossip.peer(peer)
    }

    fn set_peer_acl(&self, peer: PeerId, acl: Acl, addr: Option<String>) -> ApiResult<()> {
        match acl {
            Acl::Ban => self.gossip.ban(peer),
            Acl::Trust => self.gossip.trust(peer, addr),
            Acl::Open => self.gossip.open(peer),
        }
        info!(peer = %peer.short(), acl = ?acl, "[dal-node] Peer ACL updated");
        Ok(())
    }

    fn topics(&self) -> Vec<Topic> {
        self.gossip.topics()
    }

    fn mesh(&self) -> BTreeMap<Topic, Vec<PeerId>> {
        self.gossip.mesh()
    }

    fn attestable_slots(&self, pkh: &PublicKeyHash, attested_level: Level) -> ApiResult<Vec<bool>> {
        Ok(self.attestation.attestable_slots(pkh, attested_level)?)
    }

    fn health(&self) -> HealthResponse {
        let connected_peers = self
            .gossip
            .peers()
            .iter()
            .filter(|p| p.state == ConnectionState::Connected)
            .count();
        HealthResponse {
            status: "ok".to_string(),
            last_processed_level: self.tracker.last_processed_level(),
            connected_peers,
            joined_topics: self.gossip.topics().len(),
        }
    }

    fn metrics(&self) -> ApiResult<String> {
        dal_telemetry::encode_metrics().map_err(ApiError::internal)
    }
}
