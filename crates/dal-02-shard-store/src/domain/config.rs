use serde::Deserialize;
use shared_types::Level;

/// Shard store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Levels a commitment is kept after its retention anchor.
    pub retention_period: Level,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_period: 150,
        }
    }
}

impl StoreConfig {
    /// Whether data anchored at `anchor` has left the window at `current_level`.
    ///
    /// Kept while `current_level - anchor <= retention_period`.
    pub fn is_expired(&self, anchor: Level, current_level: Level) -> bool {
        current_level.saturating_sub(anchor) > self.retention_period
    }
}
