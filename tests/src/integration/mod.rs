//! Cross-subsystem integration tests.

pub mod end_to_end;
pub mod flows;
pub mod rpc;
pub mod scenarios;
