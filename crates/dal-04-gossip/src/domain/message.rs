//! # Wire Vocabulary
//!
//! Frames exchanged between overlay peers and the message they carry. Frames
//! are bincode-encoded; the transport adds a 4-byte big-endian length prefix.

use serde::{Deserialize, Serialize};
use shared_types::{
    Commitment, Level, PeerId, PublicKeyHash, Shard, ShardIndex, ShardProof, SlotIndex, Topic,
};

use super::errors::{GossipError, GossipResult};

/// Upper bound on an encoded frame. A shard of the largest supported
/// parameter set plus its proof fits comfortably.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Deduplication key of a message.
pub type MessageKey = (Commitment, ShardIndex);

/// Identifies one shard on one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub commitment: Commitment,
    pub level: Level,
    pub slot_index: SlotIndex,
    pub shard_index: ShardIndex,
    /// Attester the shard is destined to.
    pub pkh: PublicKeyHash,
}

impl MessageId {
    pub fn key(&self) -> MessageKey {
        (self.commitment, self.shard_index)
    }

    pub fn topic(&self) -> Topic {
        Topic::new(self.slot_index, self.pkh)
    }
}

/// A shard in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipMessage {
    pub id: MessageId,
    pub share: Vec<u8>,
    pub proof: ShardProof,
}

impl GossipMessage {
    pub fn new(id: MessageId, shard: Shard) -> Self {
        Self {
            id,
            share: shard.share,
            proof: shard.proof,
        }
    }

    pub fn topic(&self) -> Topic {
        self.id.topic()
    }

    /// The shard carried by this message.
    pub fn to_shard(&self) -> Shard {
        Shard {
            commitment: self.id.commitment,
            index: self.id.shard_index,
            share: self.share.clone(),
            proof: self.proof.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// First frame on every connection, in both directions.
    Hello {
        peer_id: PeerId,
        listen_addr: Option<String>,
    },
    Subscribe(Topic),
    Unsubscribe(Topic),
    Graft(Topic),
    Prune { topic: Topic, backoff_secs: u64 },
    IHave { topic: Topic, ids: Vec<MessageId> },
    IWant { ids: Vec<MessageId> },
    Publish(GossipMessage),
}

impl Frame {
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::Subscribe(_) => "subscribe",
            Frame::Unsubscribe(_) => "unsubscribe",
            Frame::Graft(_) => "graft",
            Frame::Prune { .. } => "prune",
            Frame::IHave { .. } => "ihave",
            Frame::IWant { .. } => "iwant",
            Frame::Publish(_) => "publish",
        }
    }

    pub fn encode(&self) -> GossipResult<Vec<u8>> {
        let bytes = bincode::serialize(self).map_err(|e| GossipError::Codec(e.to_string()))?;
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(GossipError::FrameTooLarge {
                size: bytes.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Decode a frame body. Never panics on malformed input.
    pub fn decode(bytes: &[u8]) -> GossipResult<Self> {
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(GossipError::FrameTooLarge {
                size: bytes.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        bincode::deserialize(bytes).map_err(|e| GossipError::Codec(e.to_string()))
    }
}
