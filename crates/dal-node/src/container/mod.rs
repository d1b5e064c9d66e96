//! # Subsystem Container
//!
//! Configuration and the container holding every subsystem instance.

pub mod config;
pub mod subsystems;

pub use config::{parse_profile, ConfigError, NodeConfig};
pub use subsystems::{ContainerError, SubsystemContainer};
