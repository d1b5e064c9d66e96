//! # In-Memory Transport Hub
//!
//! Deterministic multi-node overlay for tests. Every send, connection and
//! disconnection is queued on the hub; [`MemoryHub::run_until_idle`] delivers
//! them one at a time in FIFO order. Frames queued on a link that was severed
//! before delivery are dropped, like bytes in a closed socket.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use shared_types::PeerId;
use tracing::trace;

use crate::domain::{Frame, GossipError, GossipResult};
use crate::ports::inbound::GossipApi;
use crate::ports::outbound::PeerTransport;

/// Safety valve for gossip loops in a broken test setup.
const MAX_DELIVERIES: usize = 1_000_000;

enum Delivery {
    Connected { at: PeerId, peer: PeerId },
    Disconnected { at: PeerId, peer: PeerId },
    Frame { to: PeerId, from: PeerId, frame: Frame },
}

#[derive(Default)]
pub struct MemoryHub {
    nodes: RwLock<HashMap<PeerId, Weak<dyn GossipApi>>>,
    links: Mutex<BTreeSet<(PeerId, PeerId)>>,
    offline: Mutex<HashSet<PeerId>>,
    queue: Mutex<VecDeque<Delivery>>,
}

fn link(a: PeerId, b: PeerId) -> (PeerId, PeerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Address a hub node is reachable at.
pub fn memory_addr(peer: &PeerId) -> String {
    format!("memory://{peer}")
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport handle for the node `local`.
    pub fn transport(self: &Arc<Self>, local: PeerId) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport {
            hub: Arc::clone(self),
            local,
        })
    }

    pub fn register(&self, peer: PeerId, node: &Arc<dyn GossipApi>) {
        self.nodes.write().insert(peer, Arc::downgrade(node));
    }

    /// Open a link between two registered, online nodes. Returns `false`
    /// when either end is unreachable or the link already exists.
    pub fn connect(&self, a: PeerId, b: PeerId) -> bool {
        if a == b || !self.reachable(&a) || !self.reachable(&b) {
            return false;
        }
        if !self.links.lock().insert(link(a, b)) {
            return false;
        }
        let mut queue = self.queue.lock();
        queue.push_back(Delivery::Connected { at: a, peer: b });
        queue.push_back(Delivery::Connected { at: b, peer: a });
        true
    }

    /// Sever the link; both ends observe a disconnection.
    pub fn sever(&self, a: PeerId, b: PeerId) {
        if !self.links.lock().remove(&link(a, b)) {
            return;
        }
        let mut queue = self.queue.lock();
        queue.push_back(Delivery::Disconnected { at: a, peer: b });
        queue.push_back(Delivery::Disconnected { at: b, peer: a });
    }

    /// Take a node offline (severing all its links) or back online.
    pub fn set_offline(&self, peer: PeerId, offline: bool) {
        if offline {
            self.offline.lock().insert(peer);
            let linked: Vec<PeerId> = self.neighbours(&peer);
            for other in linked {
                self.sever(peer, other);
            }
        } else {
            self.offline.lock().remove(&peer);
        }
    }

    pub fn is_linked(&self, a: PeerId, b: PeerId) -> bool {
        self.links.lock().contains(&link(a, b))
    }

    pub fn neighbours(&self, peer: &PeerId) -> Vec<PeerId> {
        self.links
            .lock()
            .iter()
            .filter_map(|(a, b)| match (a == peer, b == peer) {
                (true, _) => Some(*b),
                (_, true) => Some(*a),
                _ => None,
            })
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Deliver queued events until none are left. Returns how many were
    /// delivered.
    pub fn run_until_idle(&self) -> usize {
        let mut delivered = 0;
        while delivered < MAX_DELIVERIES {
            let Some(delivery) = self.queue.lock().pop_front() else {
                break;
            };
            self.dispatch(delivery);
            delivered += 1;
        }
        delivered
    }

    fn reachable(&self, peer: &PeerId) -> bool {
        self.node(peer).is_some() && !self.offline.lock().contains(peer)
    }

    fn node(&self, peer: &PeerId) -> Option<Arc<dyn GossipApi>> {
        self.nodes.read().get(peer).and_then(Weak::upgrade)
    }

    fn dispatch(&self, delivery: Delivery) {
        match delivery {
            Delivery::Connected { at, peer } => {
                if let Some(node) = self.node(&at) {
                    // A banned peer is refused; the node severs the link itself.
                    let _ = node.on_peer_connected(peer, Some(memory_addr(&peer)));
                }
            }
            Delivery::Disconnected { at, peer } => {
                if let Some(node) = self.node(&at) {
                    node.on_peer_disconnected(peer);
                }
            }
            Delivery::Frame { to, from, frame } => {
                if !self.is_linked(to, from) {
                    trace!(frame = frame.name(), "[dal-04] Dropping frame on closed link");
                    return;
                }
                if let Some(node) = self.node(&to) {
                    node.handle_frame(from, frame);
                }
            }
        }
    }
}

/// One node's view of the hub.
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    local: PeerId,
}

impl PeerTransport for MemoryTransport {
    fn send(&self, peer: &PeerId, frame: Frame) -> GossipResult<()> {
        if !self.hub.is_linked(self.local, *peer) {
            return Err(GossipError::UnknownPeer(*peer));
        }
        self.hub.queue.lock().push_back(Delivery::Frame {
            to: *peer,
            from: self.local,
            frame,
        });
        Ok(())
    }

    fn disconnect(&self, peer: &PeerId) {
        self.hub.sever(self.local, *peer);
    }

    fn dial(&self, peer: &PeerId, _addr: &str) -> GossipResult<()> {
        if self.hub.is_linked(self.local, *peer) || self.hub.connect(self.local, *peer) {
            Ok(())
        } else {
            Err(GossipError::Transport(format!("{} unreachable", peer.short())))
        }
    }
}
