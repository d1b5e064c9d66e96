pub mod errors;
pub mod state;

pub use errors::{AmplificationError, AmplificationResult};
pub use state::{Admission, AmplificationOutcome, AmplificationStatus, AmplificationTable};
