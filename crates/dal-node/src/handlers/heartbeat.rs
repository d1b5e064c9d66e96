//! Periodic overlay maintenance: mesh graft/prune, IHave gossip, trusted
//! peer reconnection. Also refreshes the peer and topic gauges.

use std::sync::Arc;
use std::time::Duration;

use dal_04_gossip::{ConnectionState, GossipApi, HeartbeatReport};
use dal_telemetry::{PEERS_CONNECTED, TOPICS_JOINED};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct HeartbeatHandler {
    gossip: Arc<dyn GossipApi>,
    interval: Duration,
}

impl HeartbeatHandler {
    pub fn new(gossip: Arc<dyn GossipApi>, interval: Duration) -> Self {
        Self { gossip, interval }
    }

    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "[dal-04] Heartbeat started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.beat();
        }
    }

    pub fn beat(&self) -> HeartbeatReport {
        let report = self.gossip.heartbeat();
        if !report.grafted.is_empty() || !report.pruned.is_empty() || !report.reconnecting.is_empty() {
            debug!(
                grafted = report.grafted.len(),
                pruned = report.pruned.len(),
                ihave = report.ihave_sent,
                reconnecting = report.reconnecting.len(),
                "[dal-04] Heartbeat"
            );
        }

        let (peers, topics) = self.overlay_size();
        PEERS_CONNECTED.set(peers as i64);
        TOPICS_JOINED.set(topics as i64);
        report
    }

    /// (connected peers, joined topics)
    fn overlay_size(&self) -> (usize, usize) {
        let connected = self
            .gossip
            .peers()
            .iter()
            .filter(|p| p.state == ConnectionState::Connected)
            .count();
        (connected, self.gossip.topics().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dal_04_gossip::{Frame, GossipConfig, GossipResult, GossipService, PeerTransport};
    use shared_types::{PeerId, PublicKeyHash, Topic};

    struct NullTransport;

    impl PeerTransport for NullTransport {
        fn send(&self, _peer: &PeerId, _frame: Frame) -> GossipResult<()> {
            Ok(())
        }
        fn disconnect(&self, _peer: &PeerId) {}
        fn dial(&self, _peer: &PeerId, _addr: &str) -> GossipResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_overlay_size_counts_connected_peers() {
        let gossip = Arc::new(GossipService::new(
            PeerId::new([1; 32]),
            GossipConfig::default(),
            Arc::new(NullTransport),
        ));
        gossip.join(Topic::new(0, PublicKeyHash([5; 20])));
        gossip.on_peer_connected(PeerId::new([2; 32]), None).unwrap();

        gossip.on_peer_connected(PeerId::new([3; 32]), None).unwrap();
        gossip.on_peer_disconnected(PeerId::new([3; 32]));

        let handler = HeartbeatHandler::new(gossip, Duration::from_millis(10));
        handler.beat();
        assert_eq!(handler.overlay_size(), (1, 1));
    }

    #[test]
    fn test_trusted_peer_redialed_after_disconnect() {
        let gossip = Arc::new(GossipService::new(
            PeerId::new([1; 32]),
            GossipConfig {
                reconnect_base_ms: 1,
                reconnect_max_ms: 10,
                ..GossipConfig::for_testing()
            },
            Arc::new(NullTransport),
        ));
        let trusted = PeerId::new([9; 32]);
        gossip.trust(trusted, Some("127.0.0.1:1".into()));
        gossip.on_peer_connected(trusted, None).unwrap();
        gossip.on_peer_disconnected(trusted);

        let handler = HeartbeatHandler::new(gossip, Duration::from_millis(1));
        let mut redialed = false;
        for _ in 0..50 {
            std::thread::sleep(Duration::from_millis(5));
            if handler.beat().reconnecting.contains(&trusted) {
                redialed = true;
                break;
            }
        }
        assert!(redialed);
    }
}
