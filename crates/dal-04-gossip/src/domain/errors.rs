use shared_types::{Commitment, PeerId, ShardIndex, Topic};
use thiserror::Error;

/// Errors of the gossip overlay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GossipError {
    #[error("peer {0} is banned")]
    Banned(PeerId),

    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("topic {0} is not joined")]
    NotJoined(Topic),

    #[error("message for shard {shard_index} of {commitment} already seen")]
    DuplicateMessage {
        commitment: Commitment,
        shard_index: ShardIndex,
    },

    #[error("no known address for peer {0}")]
    NoAddress(PeerId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    #[error("malformed frame: {0}")]
    Codec(String),
}

pub type GossipResult<T> = Result<T, GossipError>;
