//! Per-peer bookkeeping.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use shared_types::{PeerId, Timestamp, Topic};

use super::peer_score::{PeerScore, PeerScoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Next reconnection attempt of a trusted peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectSchedule {
    pub attempts: u32,
    pub next_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub id: PeerId,
    pub addr: Option<String>,
    pub state: ConnectionState,
    pub trusted: bool,
    pub score: PeerScore,
    /// Topics the peer announced through `Subscribe`.
    pub topics: BTreeSet<Topic>,
    /// Grafts refused until the given time, per topic.
    pub backoff: HashMap<Topic, Timestamp>,
    pub reconnect: Option<ReconnectSchedule>,
    pub disconnected_at: Option<Timestamp>,
}

impl PeerRecord {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            addr: None,
            state: ConnectionState::Disconnected,
            trusted: false,
            score: PeerScore::new(),
            topics: BTreeSet::new(),
            backoff: HashMap::new(),
            reconnect: None,
            disconnected_at: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn in_backoff(&self, topic: &Topic, now: Timestamp) -> bool {
        self.backoff.get(topic).is_some_and(|until| *until > now)
    }

    /// Trusted peers are exempt from score pruning.
    pub fn meshable(&self, config: &PeerScoreConfig) -> bool {
        self.trusted || !self.score.is_below_prune(config)
    }

    pub fn info(&self, config: &PeerScoreConfig) -> PeerInfo {
        PeerInfo {
            peer_id: self.id,
            addr: self.addr.clone(),
            state: self.state,
            score: self.score.score(config),
            trusted: self.trusted,
            topics: self.topics.iter().copied().collect(),
        }
    }
}

/// Introspection view of a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub addr: Option<String>,
    pub state: ConnectionState,
    pub score: f64,
    pub trusted: bool,
    pub topics: Vec<Topic>,
}

/// What the heartbeat did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    /// (peer, topic) pairs removed from meshes.
    pub pruned: Vec<(PeerId, Topic)>,
    pub grafted: Vec<(PeerId, Topic)>,
    pub ihave_sent: usize,
    /// Trusted peers a dial was issued for.
    pub reconnecting: Vec<PeerId>,
    /// Regular peers whose retained score was forgotten.
    pub forgotten: usize,
}
