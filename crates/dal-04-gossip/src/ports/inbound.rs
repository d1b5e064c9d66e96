//! Driving port of the overlay.

use std::collections::BTreeMap;

use shared_types::{PeerId, Topic};

use crate::domain::{Frame, GossipMessage, GossipResult, HeartbeatReport, PeerInfo};

/// Gossipsub overlay API.
///
/// Called by the topic membership service (join/leave), the node's producer
/// and amplification paths (publish), the transport (connection events and
/// frames), the heartbeat task and the RPC layer (ACL and introspection).
pub trait GossipApi: Send + Sync {
    /// Join `topic`: announce the subscription and graft up to `D` peers.
    /// Returns `false` when the topic was already joined.
    fn join(&self, topic: Topic) -> bool;

    /// Leave `topic`: prune the mesh and announce the unsubscription.
    /// Returns `false` when the topic was not joined.
    fn leave(&self, topic: Topic) -> bool;

    /// Publish a locally produced message. Returns the number of peers it
    /// was sent to.
    ///
    /// ## Errors
    ///
    /// - `DuplicateMessage`: the message was already seen
    fn publish(&self, message: GossipMessage) -> GossipResult<usize>;

    /// A connection to `peer` is open.
    ///
    /// ## Errors
    ///
    /// - `Banned`: the peer is banned; the connection was closed
    fn on_peer_connected(&self, peer: PeerId, addr: Option<String>) -> GossipResult<()>;

    fn on_peer_disconnected(&self, peer: PeerId);

    /// A dial issued by the heartbeat failed.
    fn on_dial_failed(&self, peer: PeerId);

    /// Process one frame received from `from`.
    fn handle_frame(&self, from: PeerId, frame: Frame);

    /// Periodic mesh maintenance.
    fn heartbeat(&self) -> HeartbeatReport;

    /// Sever the connection, blacklist the peer and revoke trust.
    fn ban(&self, peer: PeerId);

    fn unban(&self, peer: PeerId);

    /// Mark the peer trusted and schedule a connection to it.
    fn trust(&self, peer: PeerId, addr: Option<String>);

    /// Lift both ban and trust.
    fn open(&self, peer: PeerId);

    fn peers(&self) -> Vec<PeerInfo>;

    fn peer(&self, peer: &PeerId) -> Option<PeerInfo>;

    fn is_banned(&self, peer: &PeerId) -> bool;

    fn topics(&self) -> Vec<Topic>;

    fn mesh(&self) -> BTreeMap<Topic, Vec<PeerId>>;
}
