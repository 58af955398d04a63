//! Error types for CareKey core.

use thiserror::Error;

use crate::types::GrantId;

/// Errors from core scope and grant operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Scope validation failed.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Grant id absent from the active set.
    #[error("grant not found: {0}")]
    GrantNotFound(GrantId),

    /// Grant has been revoked.
    #[error("grant has been revoked: {0}")]
    GrantRevoked(GrantId),

    /// Grant is past expiry.
    #[error("grant has expired: {0}")]
    GrantExpired(GrantId),

    /// Encoding error.
    #[error("encoding error: {0}")]
    EncodingError(String),

    /// Decoding error.
    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
