//! Error types for the vault.

use thiserror::Error;

/// Errors from vault crypto and record operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Encryption failed.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption failed (wrong key, tampered ciphertext).
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Key derivation failed.
    #[error("key derivation error: {0}")]
    KeyDerivationError(String),

    /// The vault has no content key yet.
    #[error("vault is not provisioned")]
    NotProvisioned,

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
