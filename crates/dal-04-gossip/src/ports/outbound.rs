//! Driven ports of the overlay.

use shared_types::PeerId;

use crate::domain::{Frame, GossipMessage, GossipResult};

/// Moves frames between peers.
///
/// Calls must not block on the network: adapters queue frames and report
/// failures later as disconnections.
pub trait PeerTransport: Send + Sync {
    /// Queue `frame` for `peer`.
    ///
    /// ## Errors
    ///
    /// - `UnknownPeer`: no open connection to `peer`
    /// - `Transport`: the peer's outgoing queue is full or closed
    fn send(&self, peer: &PeerId, frame: Frame) -> GossipResult<()>;

    /// Close the connection. Both ends observe a disconnection.
    fn disconnect(&self, peer: &PeerId);

    /// Start connecting to `peer` at `addr`. Completion is reported through
    /// `GossipApi::on_peer_connected`.
    fn dial(&self, peer: &PeerId, addr: &str) -> GossipResult<()>;
}

/// Outcome of application-level validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Valid: cache, deliver, forward.
    Accept,
    /// Provably invalid: penalize the sender, drop.
    Reject(String),
    /// Not checkable now (e.g. unknown committee): drop without penalty.
    Ignore,
}

pub trait MessageValidator: Send + Sync {
    fn validate(&self, message: &GossipMessage) -> ValidationResult;
}

/// Receives accepted messages on joined topics.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, message: &GossipMessage);
}

/// Validator accepting everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl MessageValidator for AcceptAll {
    fn validate(&self, _message: &GossipMessage) -> ValidationResult {
        ValidationResult::Accept
    }
}

/// Sink discarding everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl MessageSink for DiscardSink {
    fn deliver(&self, _message: &GossipMessage) {}
}
