//! Committee table: one immutable [`Committee`] per level.
//!
//! Readers clone an `Arc` and never observe a half-installed committee; an
//! install replaces the whole entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{Committee, Level};

#[derive(Debug, Default)]
pub struct CommitteeTable {
    levels: RwLock<BTreeMap<Level, Arc<Committee>>>,
}

impl CommitteeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, committee: Committee) {
        self.levels
            .write()
            .insert(committee.level, Arc::new(committee));
    }

    pub fn get(&self, level: Level) -> Option<Arc<Committee>> {
        self.levels.read().get(&level).cloned()
    }

    /// Committees of `level` and `level + 1` that are known.
    pub fn relevant(&self, level: Level) -> Vec<Arc<Committee>> {
        let levels = self.levels.read();
        [Some(level), level.checked_add(1)]
            .into_iter()
            .flatten()
            .filter_map(|l| levels.get(&l).cloned())
            .collect()
    }

    /// Drop committees strictly below `level`. Returns how many were dropped.
    pub fn prune_below(&self, level: Level) -> usize {
        let mut levels = self.levels.write();
        let kept = levels.split_off(&level);
        let dropped = levels.len();
        *levels = kept;
        dropped
    }

    pub fn len(&self) -> usize {
        self.levels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.read().is_empty()
    }
}
