//! # Topic Membership (dal-05)
//!
//! Decides which gossip topics the node belongs to. The joined set is a pure
//! function of the active profiles and the committees of the current and
//! next level; any change to either triggers a reconciliation against the
//! gossip overlay.
//!
//! ```text
//!  set_profiles ──┐
//!                 ├──▶ desired_topics(profiles, committees) ──▶ diff ──▶ leave / join
//!  finalized ─────┘                                                        (TopicSubscriber)
//!  block
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Bootstrap is exclusive | `normalize_profiles` |
//! | Profiles persisted before they apply | `MembershipService::apply_profiles` |
//! | Joined set independent of event order | `desired_topics` is pure |
//! | Committees immutable once installed | `CommitteeTable` stores `Arc<Committee>` |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::ProfileStore;
pub use domain::{
    desired_topics, normalize_profiles, CommitteeTable, MembershipConfig, MembershipDiff,
    MembershipError, MembershipResult,
};
pub use ports::inbound::TopicMembershipApi;
pub use ports::outbound::TopicSubscriber;
pub use service::MembershipService;
