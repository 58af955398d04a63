//! Sealed record envelope.
//!
//! Every record stored in a vault bucket is wrapped in a SealedRecord
//! envelope holding the ciphertext and the metadata needed to open it
//! (given the content key).

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{Result, VaultError};

/// Format identifier for sealed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SealFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// An encrypted record envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    /// Encryption algorithm used.
    pub format: SealFormat,

    /// Nonce used for encryption (unique per seal).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,

    /// When the record was sealed (Unix milliseconds).
    pub sealed_at_ms: i64,
}

impl SealedRecord {
    /// Seal plaintext with the given key.
    pub fn seal(plaintext: &[u8], key: &EncryptionKey, now_ms: i64) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            format: SealFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
            sealed_at_ms: now_ms,
        })
    }

    /// Open with the given key.
    pub fn open(&self, key: &EncryptionKey) -> Result<Vec<u8>> {
        match self.format {
            SealFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| VaultError::SerializationError(e.to_string()))
    }

    /// Size of the ciphertext.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}
