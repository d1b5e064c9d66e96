use dal_02_shard_store::StoreError;
use thiserror::Error;

/// Failures that abort an amplification attempt without recording it.
///
/// Reconstruction failures are not errors: they are recorded and reported as
/// [`super::AmplificationOutcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmplificationError {
    #[error("shard store failure: {0}")]
    Store(#[from] StoreError),
}

pub type AmplificationResult<T> = Result<T, AmplificationError>;
