use shared_types::{Commitment, Level, SlotIndex};

use crate::domain::{AmplificationOutcome, AmplificationResult, AmplificationStatus};

pub trait AmplificationApi: Send + Sync {
    /// Called after a shard of `commitment` was stored. Reconstructs and
    /// republishes the missing shards once the threshold is reached.
    ///
    /// Blocking: reconstruction is CPU bound, callers on an async runtime
    /// run this on the blocking pool.
    ///
    /// ## Errors
    ///
    /// - `Store`: reading or writing shards failed; the attempt is dropped
    ///   and the next trigger starts over
    fn on_shard_received(
        &self,
        commitment: Commitment,
        level: Level,
        slot_index: SlotIndex,
    ) -> AmplificationResult<AmplificationOutcome>;

    fn status(&self, commitment: &Commitment) -> Option<AmplificationStatus>;

    /// Forget commitments removed from the store.
    fn forget(&self, commitments: &[Commitment]);

    /// Drop bookkeeping for commitments published before `level`.
    fn prune_below(&self, level: Level) -> usize;
}
