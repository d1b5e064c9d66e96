//! Per-commitment amplification bookkeeping.

use std::collections::HashMap;

use shared_types::{Commitment, Level};

/// Where a commitment stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmplificationStatus {
    InProgress,
    /// Every shard is held, either amplified here or received.
    Done,
    /// Last reconstruction failed with `held` shards in store.
    Failed { held: usize },
}

/// Result of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmplificationOutcome {
    BelowThreshold { held: usize, threshold: usize },
    NoMissingShard,
    AlreadyAmplified,
    /// Another trigger for the same commitment is running.
    InProgress,
    /// A previous attempt failed and no shard arrived since.
    AwaitingNewShards { held: usize },
    Amplified { republished: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    level: Level,
    status: AmplificationStatus,
}

/// What the caller may do after [`AmplificationTable::try_begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    Skip(AmplificationStatus),
}

#[derive(Debug, Default)]
pub struct AmplificationTable {
    entries: HashMap<Commitment, Entry>,
}

impl AmplificationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `commitment` in progress unless it is done, already running, or
    /// failed with at least as many shards as `held`.
    pub fn try_begin(&mut self, commitment: Commitment, level: Level, held: usize) -> Admission {
        if let Some(entry) = self.entries.get(&commitment) {
            match entry.status {
                AmplificationStatus::Done | AmplificationStatus::InProgress => {
                    return Admission::Skip(entry.status);
                }
                AmplificationStatus::Failed { held: at_failure } if held <= at_failure => {
                    return Admission::Skip(entry.status);
                }
                AmplificationStatus::Failed { .. } => {}
            }
        }
        self.entries.insert(
            commitment,
            Entry {
                level,
                status: AmplificationStatus::InProgress,
            },
        );
        Admission::Proceed
    }

    pub fn finish(&mut self, commitment: &Commitment, status: AmplificationStatus) {
        if let Some(entry) = self.entries.get_mut(commitment) {
            entry.status = status;
        }
    }

    /// Drop an in-progress entry after an aborted attempt.
    pub fn abort(&mut self, commitment: &Commitment) {
        if matches!(
            self.entries.get(commitment).map(|e| e.status),
            Some(AmplificationStatus::InProgress)
        ) {
            self.entries.remove(commitment);
        }
    }

    pub fn status(&self, commitment: &Commitment) -> Option<AmplificationStatus> {
        self.entries.get(commitment).map(|e| e.status)
    }

    pub fn forget(&mut self, commitment: &Commitment) -> bool {
        self.entries.remove(commitment).is_some()
    }

    /// Drop entries published before `level`; returns how many.
    pub fn prune_below(&mut self, level: Level) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.level >= level || e.status == AmplificationStatus::InProgress);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(b: u8) -> Commitment {
        Commitment([b; 32])
    }

    #[test]
    fn test_second_trigger_is_coalesced() {
        let mut table = AmplificationTable::new();
        assert_eq!(table.try_begin(c(1), 5, 4), Admission::Proceed);
        assert_eq!(
            table.try_begin(c(1), 5, 5),
            Admission::Skip(AmplificationStatus::InProgress)
        );
    }

    #[test]
    fn test_failed_retries_only_with_more_shards() {
        let mut table = AmplificationTable::new();
        table.try_begin(c(1), 5, 4);
        table.finish(&c(1), AmplificationStatus::Failed { held: 4 });

        assert_eq!(
            table.try_begin(c(1), 5, 4),
            Admission::Skip(AmplificationStatus::Failed { held: 4 })
        );
        assert_eq!(table.try_begin(c(1), 5, 5), Admission::Proceed);
    }

    #[test]
    fn test_done_is_final() {
        let mut table = AmplificationTable::new();
        table.try_begin(c(1), 5, 4);
        table.finish(&c(1), AmplificationStatus::Done);
        assert_eq!(
            table.try_begin(c(1), 5, 100),
            Admission::Skip(AmplificationStatus::Done)
        );
    }

    #[test]
    fn test_abort_allows_retry() {
        let mut table = AmplificationTable::new();
        table.try_begin(c(1), 5, 4);
        table.abort(&c(1));
        assert!(table.is_empty());
        assert_eq!(table.try_begin(c(1), 5, 4), Admission::Proceed);
    }

    #[test]
    fn test_prune_keeps_running_entries() {
        let mut table = AmplificationTable::new();
        table.try_begin(c(1), 1, 4);
        table.try_begin(c(2), 2, 4);
        table.finish(&c(2), AmplificationStatus::Done);
        table.try_begin(c(3), 9, 4);
        table.finish(&c(3), AmplificationStatus::Done);

        assert_eq!(table.prune_below(5), 1);
        assert_eq!(table.status(&c(1)), Some(AmplificationStatus::InProgress));
        assert_eq!(table.status(&c(2)), None);
        assert_eq!(table.status(&c(3)), Some(AmplificationStatus::Done));
    }
}
