//! Shared error types across qwire crates.

use thiserror::Error;

/// Stable error codes (surfaced in logs and tooling output).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A field could not be decoded by its codec.
    DecodeFailed,
    /// Malformed envelope or configuration.
    BadRequest,
    /// Operation intentionally not provided by this adapter.
    Unsupported,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DecodeFailed => "DECODE_FAILED",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Unsupported => "UNSUPPORTED",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// A codec could not turn encoded bytes into a domain value.
///
/// Raised lazily, by the accessor that first touches the field.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown type: {type_name}")]
    UnknownType { type_name: String },
    #[error("revision mismatch for {type_name}: expected {expected}, got {actual}")]
    RevisionMismatch {
        type_name: String,
        expected: String,
        actual: String,
    },
    #[error("malformed {type_name}: {reason}")]
    Malformed { type_name: String, reason: String },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
}

impl DecodeError {
    pub(crate) fn malformed(type_name: &str, reason: impl std::fmt::Display) -> Self {
        DecodeError::Malformed {
            type_name: type_name.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, QwireError>;

/// Unified error type used by core and host.
#[derive(Debug, Error)]
pub enum QwireError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl QwireError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            QwireError::Decode(_) => ErrorCode::DecodeFailed,
            QwireError::BadRequest(_) => ErrorCode::BadRequest,
            QwireError::Unsupported(_) => ErrorCode::Unsupported,
            QwireError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            QwireError::Internal(_) => ErrorCode::Internal,
        }
    }
}
