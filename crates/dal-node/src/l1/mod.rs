//! # L1 Boundary
//!
//! Finalized blocks enter as [`RawFinalizedBlock`]s from a source, are decoded
//! by the [`ProtocolServices`] of their protocol and handed to the block
//! consumer in strictly increasing level order.

pub mod follower;
pub mod protocol;
pub mod registry;

pub use follower::{block_channel, BlockFeed, FollowerError, HttpFollower};
pub use protocol::{DecodeError, ProtocolServices, RawFinalizedBlock, PROTO_ALPHA, PROTO_BETA};
pub use registry::ProtocolRegistry;
