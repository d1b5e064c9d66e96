//! Domain layer: stored values, key layout, configuration and errors.

pub mod config;
pub mod entities;
pub mod errors;
pub mod keys;
