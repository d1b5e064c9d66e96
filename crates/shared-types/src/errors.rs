//! # Error Types
//!
//! Errors shared by several subsystems.

use thiserror::Error;

/// Failure to parse an identifier from its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("invalid base58check encoding: {0}")]
    InvalidBase58(String),

    #[error("unexpected prefix for {kind}")]
    WrongPrefix { kind: &'static str },

    #[error("invalid length for {kind}: expected {expected} bytes, got {actual}")]
    WrongLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),
}

/// Errors raised by [`crate::KeyValueStore`] backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

impl KVStoreError {
    pub fn io(err: impl std::fmt::Display) -> Self {
        KVStoreError::IOError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_error_display() {
        let err = KVStoreError::io("disk failure");
        assert_eq!(err.to_string(), "KV store I/O error: disk failure");
    }

    #[test]
    fn test_identifier_error_display() {
        let err = IdentifierError::WrongLength {
            kind: "commitment",
            expected: 32,
            actual: 3,
        };
        assert!(err.to_string().contains("expected 32 bytes"));
    }
}
