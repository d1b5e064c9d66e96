//! Domain layer: parameters, field packing, erasure code and Merkle tree.

pub mod erasure;
pub mod errors;
pub mod field;
pub mod merkle;
pub mod parameters;
