pub mod errors;

pub use errors::{AttestationError, AttestationResult};
