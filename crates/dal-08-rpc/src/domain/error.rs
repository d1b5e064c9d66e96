//! RPC error type with stable machine-readable codes.
//!
//! Every subsystem error converts into an [`ApiError`]. Server-side failures
//! are logged in full and answered with a generic message.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dal_01_cryptobox::CryptoboxError;
use dal_02_shard_store::StoreError;
use dal_03_slot_tracker::TrackerError;
use dal_04_gossip::GossipError;
use dal_05_topic_membership::MembershipError;
use dal_07_attestation::AttestationError;
use shared_types::IdentifierError;
use thiserror::Error;
use tracing::error;

/// Values of the `code` field.
pub mod codes {
    pub const INVALID_SLOT_SIZE: &str = "invalid_slot_size";
    pub const INVALID_PROOF: &str = "invalid_proof";
    pub const INVALID_PARAMETER: &str = "invalid_parameter";
    pub const INVALID_PROFILES: &str = "invalid_profiles";
    pub const LEVEL_TOO_LOW: &str = "level_too_low";
    pub const NOT_FOUND: &str = "not_found";
    pub const NOT_IN_COMMITTEE: &str = "not_in_committee";
    pub const COMMITTEE_UNKNOWN: &str = "committee_unknown";
    pub const STORAGE_ERROR: &str = "storage_error";
    pub const RECONSTRUCTION_FAILED: &str = "reconstruction_failed";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn invalid_slot_size(expected: usize, actual: usize) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_SLOT_SIZE,
            format!("slot must be exactly {expected} bytes, got {actual}"),
        )
    }

    pub fn invalid_parameter(details: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_PARAMETER,
            format!("invalid parameter: {details}"),
        )
    }

    pub fn not_found(resource: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            format!("{resource} not found"),
        )
    }

    /// Logs `details` and hides them from the caller.
    pub fn server(code: &'static str, details: impl fmt::Display) -> Self {
        error!(code, error = %details, "[dal-08] Request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            "internal error while serving the request",
        )
    }

    pub fn internal(details: impl fmt::Display) -> Self {
        Self::server(codes::INTERNAL_ERROR, details)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.status.as_u16(), self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<IdentifierError> for ApiError {
    fn from(e: IdentifierError) -> Self {
        ApiError::invalid_parameter(e)
    }
}

impl From<CryptoboxError> for ApiError {
    fn from(e: CryptoboxError) -> Self {
        match e {
            CryptoboxError::InvalidSlotSize { expected, actual } => {
                ApiError::invalid_slot_size(expected, actual)
            }
            CryptoboxError::NotEnoughShards { .. } => ApiError::not_found("slot"),
            CryptoboxError::PageIndexOutOfRange { .. } => ApiError::not_found("page"),
            CryptoboxError::InvalidShardProof { .. }
            | CryptoboxError::CommitmentMismatch { .. }
            | CryptoboxError::InvalidShardLength { .. }
            | CryptoboxError::InvalidShardEncoding { .. }
            | CryptoboxError::ShardIndexOutOfRange { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, codes::INVALID_PROOF, e.to_string())
            }
            CryptoboxError::InconsistentShards => ApiError::server(codes::RECONSTRUCTION_FAILED, e),
            CryptoboxError::InvalidParameters(_) => ApiError::internal(e),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::not_found("shard"),
            StoreError::CommitmentProofNotFound { .. } => ApiError::not_found("commitment"),
            StoreError::InvalidProof { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, codes::INVALID_PROOF, e.to_string())
            }
            StoreError::Corrupted { .. } | StoreError::Backend(_) => {
                ApiError::server(codes::STORAGE_ERROR, e)
            }
        }
    }
}

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::InvalidSlotIndex { .. } => ApiError::invalid_parameter(e),
            TrackerError::Corrupted(_) | TrackerError::Storage(_) => {
                ApiError::server(codes::STORAGE_ERROR, e)
            }
            TrackerError::NonMonotonicLevel { .. } | TrackerError::IllegalTransition { .. } => {
                ApiError::internal(e)
            }
        }
    }
}

impl From<MembershipError> for ApiError {
    fn from(e: MembershipError) -> Self {
        match e {
            MembershipError::BootstrapNotExclusive | MembershipError::InvalidSlotIndex { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, codes::INVALID_PROFILES, e.to_string())
            }
            MembershipError::Corrupted(_) | MembershipError::Storage(_) => {
                ApiError::server(codes::STORAGE_ERROR, e)
            }
        }
    }
}

impl From<AttestationError> for ApiError {
    fn from(e: AttestationError) -> Self {
        match e {
            AttestationError::NotInCommittee { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, codes::NOT_IN_COMMITTEE, e.to_string())
            }
            AttestationError::CommitteeUnknown(_) => {
                ApiError::new(StatusCode::NOT_FOUND, codes::COMMITTEE_UNKNOWN, e.to_string())
            }
            AttestationError::LevelTooLow { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, codes::LEVEL_TOO_LOW, e.to_string())
            }
            AttestationError::Storage(_) => ApiError::server(codes::STORAGE_ERROR, e),
        }
    }
}

impl From<GossipError> for ApiError {
    fn from(e: GossipError) -> Self {
        match e {
            GossipError::UnknownPeer(_) => ApiError::not_found("peer"),
            GossipError::NoAddress(_) => ApiError::invalid_parameter(e),
            other => ApiError::internal(other),
        }
    }
}

/// Failures of the server itself, outside any request.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("cannot bind RPC server on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("RPC server failed: {0}")]
    Serve(std::io::Error),
}
