pub mod cache;
pub mod config;
pub mod errors;
pub mod message;
pub mod peer;
pub mod peer_score;

pub use cache::{MessageCache, SeenCache};
pub use config::GossipConfig;
pub use errors::{GossipError, GossipResult};
pub use message::{Frame, GossipMessage, MessageId, MessageKey, MAX_FRAME_SIZE};
pub use peer::{ConnectionState, HeartbeatReport, PeerInfo, PeerRecord, ReconnectSchedule};
pub use peer_score::{PeerScore, PeerScoreConfig};
