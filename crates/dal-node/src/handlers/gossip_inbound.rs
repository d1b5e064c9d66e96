//! Dispatches transport events into the gossip overlay.

use std::sync::Arc;

use dal_04_gossip::GossipApi;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::adapters::Inbound;

pub struct GossipInboundHandler {
    gossip: Arc<dyn GossipApi>,
    receiver: mpsc::Receiver<Inbound>,
}

impl GossipInboundHandler {
    pub fn new(gossip: Arc<dyn GossipApi>, receiver: mpsc::Receiver<Inbound>) -> Self {
        Self { gossip, receiver }
    }

    pub async fn run(mut self) {
        info!("[dal-04] Gossip inbound handler started");
        while let Some(event) = self.receiver.recv().await {
            self.dispatch(event);
        }
        info!("[dal-04] Transport channel closed, exiting");
    }

    fn dispatch(&self, event: Inbound) {
        match event {
            Inbound::Connected { peer, addr } => {
                // Banned peers are refused and disconnected by the overlay.
                if let Err(e) = self.gossip.on_peer_connected(peer, addr) {
                    debug!(peer = %peer.short(), error = %e, "[dal-04] Connection refused");
                }
            }
            Inbound::Frame { peer, frame } => {
                trace!(peer = %peer.short(), frame = frame.name(), "[dal-04] Frame received");
                self.gossip.handle_frame(peer, frame);
            }
            Inbound::Disconnected { peer } => self.gossip.on_peer_disconnected(peer),
            Inbound::DialFailed { peer } => self.gossip.on_dial_failed(peer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dal_04_gossip::{Frame, GossipMessage, GossipResult, HeartbeatReport, PeerInfo};
    use parking_lot::Mutex;
    use shared_types::{PeerId, PublicKeyHash, Topic};
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MockGossip {
        calls: Mutex<Vec<String>>,
    }

    impl MockGossip {
        fn record(&self, call: &str, peer: PeerId) {
            self.calls.lock().push(format!("{call}:{}", peer.0[0]));
        }
    }

    impl GossipApi for MockGossip {
        fn join(&self, _topic: Topic) -> bool {
            true
        }
        fn leave(&self, _topic: Topic) -> bool {
            true
        }
        fn publish(&self, _message: GossipMessage) -> GossipResult<usize> {
            Ok(0)
        }
        fn on_peer_connected(&self, peer: PeerId, _addr: Option<String>) -> GossipResult<()> {
            self.record("connected", peer);
            Ok(())
        }
        fn on_peer_disconnected(&self, peer: PeerId) {
            self.record("disconnected", peer);
        }
        fn on_dial_failed(&self, peer: PeerId) {
            self.record("dial_failed", peer);
        }
        fn handle_frame(&self, from: PeerId, frame: Frame) {
            self.record(frame.name(), from);
        }
        fn heartbeat(&self) -> HeartbeatReport {
            HeartbeatReport::default()
        }
        fn ban(&self, _peer: PeerId) {}
        fn unban(&self, _peer: PeerId) {}
        fn trust(&self, _peer: PeerId, _addr: Option<String>) {}
        fn open(&self, _peer: PeerId) {}
        fn peers(&self) -> Vec<PeerInfo> {
            vec![]
        }
        fn peer(&self, _peer: &PeerId) -> Option<PeerInfo> {
            None
        }
        fn is_banned(&self, _peer: &PeerId) -> bool {
            false
        }
        fn topics(&self) -> Vec<Topic> {
            vec![]
        }
        fn mesh(&self) -> BTreeMap<Topic, Vec<PeerId>> {
            BTreeMap::new()
        }
    }

    #[tokio::test]
    async fn test_events_dispatched_in_order() {
        let gossip = Arc::new(MockGossip::default());
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(GossipInboundHandler::new(gossip.clone(), rx).run());

        let peer = PeerId::new([3; 32]);
        let topic = Topic::new(1, PublicKeyHash([0; 20]));
        tx.send(Inbound::Connected { peer, addr: None }).await.unwrap();
        tx.send(Inbound::Frame {
            peer,
            frame: Frame::Subscribe(topic),
        })
        .await
        .unwrap();
        tx.send(Inbound::Disconnected { peer }).await.unwrap();
        tx.send(Inbound::DialFailed { peer }).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            *gossip.calls.lock(),
            vec!["connected:3", "subscribe:3", "disconnected:3", "dial_failed:3"]
        );
    }
}
