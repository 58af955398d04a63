//! Error types for the store.
//!
//! Store failures are the only conditions in the system treated as
//! fatal/retryable infrastructure errors; everything above the store
//! branches on its own recoverable error taxonomy.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Put with a stale expected version.
    #[error("version conflict on {id}: expected {expected}, existing {existing}")]
    VersionConflict {
        /// Hex of the record id.
        id: String,
        /// The version the caller expected.
        expected: u64,
        /// The version actually stored.
        existing: u64,
    },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
