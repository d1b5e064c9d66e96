//! # Backend Port
//!
//! Everything the REST surface needs from the node. The node implements it
//! over its subsystem services; tests implement it with fixtures.
//!
//! Methods are synchronous. Handlers move the CPU-heavy ones
//! (`post_slot`, `slot`, `pages`) to the blocking pool.

use std::collections::BTreeMap;

use dal_04_gossip::PeerInfo;
use shared_types::{
    Commitment, CommitmentProof, HeaderStatus, Level, PeerId, Profile, PublicKeyHash, Shard,
    ShardIndex, SlotHeader, SlotIndex, Topic,
};

use crate::domain::{Acl, ApiResult, HealthResponse};

pub trait DalBackend: Send + Sync + 'static {
    /// Commit, shard and store a slot. Blocking.
    fn post_slot(&self, slot: &[u8]) -> ApiResult<Commitment>;

    /// Record that `commitment` will be published at these coordinates.
    fn publish_intent(&self, commitment: Commitment, level: Level, slot_index: SlotIndex) -> ApiResult<()>;

    /// Reconstructed slot bytes. Blocking.
    fn slot(&self, commitment: &Commitment) -> ApiResult<Vec<u8>>;

    fn commitment_proof(&self, commitment: &Commitment) -> ApiResult<CommitmentProof>;

    fn headers_of(&self, commitment: &Commitment) -> Vec<SlotHeader>;

    fn commitment_at(&self, level: Level, slot_index: SlotIndex) -> Option<Commitment>;

    fn status_at(&self, level: Level, slot_index: SlotIndex) -> Option<HeaderStatus>;

    /// Pages of the slot at these coordinates. Blocking.
    fn pages(&self, level: Level, slot_index: SlotIndex) -> ApiResult<(Commitment, Vec<Vec<u8>>)>;

    fn shard(&self, commitment: &Commitment, shard_index: ShardIndex) -> ApiResult<Shard>;

    fn profiles(&self) -> Vec<Profile>;

    /// Add profiles; returns the resulting list.
    fn add_profiles(&self, profiles: Vec<Profile>) -> ApiResult<Vec<Profile>>;

    fn peers(&self) -> Vec<PeerInfo>;

    fn peer(&self, peer: &PeerId) -> Option<PeerInfo>;

    fn set_peer_acl(&self, peer: PeerId, acl: Acl, addr: Option<String>) -> ApiResult<()>;

    fn topics(&self) -> Vec<Topic>;

    fn mesh(&self) -> BTreeMap<Topic, Vec<PeerId>>;

    fn attestable_slots(&self, pkh: &PublicKeyHash, attested_level: Level) -> ApiResult<Vec<bool>>;

    fn health(&self) -> HealthResponse;

    /// Prometheus text exposition.
    fn metrics(&self) -> ApiResult<String>;
}
