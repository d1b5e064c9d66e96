use serde::{Deserialize, Serialize};

use super::peer_score::PeerScoreConfig;

/// Overlay parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Target mesh degree.
    pub d: usize,
    /// Graft when a mesh falls below this.
    pub d_low: usize,
    /// Prune when a mesh grows above this.
    pub d_high: usize,
    /// Maximum peers receiving `IHave` per topic and heartbeat.
    pub d_lazy: usize,
    pub heartbeat_interval_ms: u64,
    /// Heartbeats a message stays available for `IWant`.
    pub history_length: usize,
    /// Heartbeats a message is advertised through `IHave`.
    pub history_gossip: usize,
    pub seen_cache_size: usize,
    /// Backoff sent with `Prune` and honoured before re-grafting.
    pub prune_backoff_secs: u64,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub score: PeerScoreConfig,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            d: 8,
            d_low: 6,
            d_high: 12,
            d_lazy: 6,
            heartbeat_interval_ms: 1_000,
            history_length: 6,
            history_gossip: 3,
            seen_cache_size: 100_000,
            prune_backoff_secs: 60,
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 60_000,
            score: PeerScoreConfig::default(),
        }
    }
}

impl GossipConfig {
    /// Small meshes and short backoffs, for tests.
    pub fn for_testing() -> Self {
        Self {
            d: 3,
            d_low: 2,
            d_high: 4,
            d_lazy: 3,
            heartbeat_interval_ms: 100,
            history_length: 4,
            history_gossip: 2,
            seen_cache_size: 1_024,
            prune_backoff_secs: 2,
            reconnect_base_ms: 100,
            reconnect_max_ms: 1_600,
            score: PeerScoreConfig::for_testing(),
        }
    }

    /// Delay before reconnection attempt number `attempt` (0-based).
    pub fn reconnect_delay_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        self.reconnect_base_ms
            .saturating_mul(factor)
            .min(self.reconnect_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay_doubles_then_caps() {
        let config = GossipConfig::for_testing();
        assert_eq!(config.reconnect_delay_ms(0), 100);
        assert_eq!(config.reconnect_delay_ms(1), 200);
        assert_eq!(config.reconnect_delay_ms(4), 1_600);
        assert_eq!(config.reconnect_delay_ms(10), 1_600);
        assert_eq!(config.reconnect_delay_ms(u32::MAX), 1_600);
    }

    #[test]
    fn test_degree_bounds_consistent() {
        for config in [GossipConfig::default(), GossipConfig::for_testing()] {
            assert!(config.d_low <= config.d && config.d <= config.d_high);
            assert!(config.history_gossip <= config.history_length);
        }
    }
}
