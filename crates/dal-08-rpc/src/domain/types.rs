//! Request and response bodies.

use serde::{Deserialize, Serialize};
use shared_types::{Commitment, HeaderStatus, Level, PeerId, Shard, ShardIndex, SlotIndex, Topic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentResponse {
    pub commitment: Commitment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishIntentRequest {
    pub slot_level: Level,
    pub slot_index: SlotIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResponse {
    /// Hex encoded.
    pub proof: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: HeaderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesResponse {
    pub commitment: Commitment,
    /// Hex encoded, in page order.
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardResponse {
    pub commitment: Commitment,
    pub shard_index: ShardIndex,
    pub share: String,
    pub proof: Vec<String>,
}

impl From<Shard> for ShardResponse {
    fn from(shard: Shard) -> Self {
        Self {
            commitment: shard.commitment,
            shard_index: shard.index,
            share: hex::encode(&shard.share),
            proof: shard.proof.0.iter().map(hex::encode).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acl {
    Ban,
    Trust,
    /// Lift a ban or a trust.
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAclRequest {
    pub acl: Acl,
    /// Address to dial for `trust`; the known address is kept when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshEntry {
    pub topic: Topic,
    pub peers: Vec<PeerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestableSlotsResponse {
    pub attestable_slots: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub last_processed_level: Option<Level>,
    pub connected_peers: usize,
    pub joined_topics: usize,
}
