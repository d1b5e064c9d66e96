use std::sync::Arc;

use shared_types::{Committee, FinalizedBlock, Level, Profile, Topic};

use crate::domain::{MembershipDiff, MembershipResult};

pub trait TopicMembershipApi: Send + Sync {
    /// Install the block's committees and reconcile the joined topics.
    ///
    /// ## Errors
    ///
    /// Never fails today; the signature leaves room for committee sources
    /// that can.
    fn on_finalized_block(&self, block: &FinalizedBlock) -> MembershipResult<MembershipDiff>;

    /// Replace the profile list. Validated and persisted before it applies.
    ///
    /// ## Errors
    ///
    /// - `BootstrapNotExclusive`: Bootstrap mixed with other profiles
    /// - `InvalidSlotIndex`: a producer or observer index is out of range
    /// - `Storage`: persisting failed; the previous profiles stay active
    fn set_profiles(&self, profiles: Vec<Profile>) -> MembershipResult<MembershipDiff>;

    /// Add to the current profile list, with the same checks as
    /// `set_profiles` on the union.
    fn add_profiles(&self, profiles: Vec<Profile>) -> MembershipResult<MembershipDiff>;

    fn profiles(&self) -> Vec<Profile>;

    fn committee(&self, level: Level) -> Option<Arc<Committee>>;

    fn joined_topics(&self) -> Vec<Topic>;

    /// Last level whose committees were installed.
    fn current_level(&self) -> Option<Level>;
}
