//! Content-key wrapping to the owner's public key.
//!
//! A vault's content key is wrapped via ephemeral X25519 ECDH against the
//! owner's static public key. Only the holder of the owner's secret can
//! unwrap it, which makes the owner the only party able to materialize
//! plaintext records. The wrapped key can be persisted alongside the
//! vault with no further protection.

use serde::{Deserialize, Serialize};

use crate::crypto::{
    EncryptionKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey, X25519StaticSecret,
};
use crate::error::{Result, VaultError};

/// A content key encrypted to an owner's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Ephemeral X25519 public key (wrapping side of the ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// The content key, encrypted with the derived shared secret.
    pub encrypted_key: Vec<u8>,

    /// Nonce used for the wrap.
    pub nonce: EncryptionNonce,
}

impl WrappedKey {
    /// Wrap a content key to the owner's public key.
    pub fn wrap(content_key: &EncryptionKey, owner_public: &X25519PublicKey) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let shared = ephemeral.diffie_hellman(owner_public);
        let wrap_key = shared.derive_encryption_key(b"carekey-keywrap");

        let nonce = EncryptionNonce::generate();
        let encrypted_key = wrap_key.encrypt(content_key.as_bytes(), &nonce)?;

        Ok(Self {
            ephemeral_public,
            encrypted_key,
            nonce,
        })
    }

    /// Unwrap with the owner's secret key.
    pub fn unwrap_key(&self, owner_secret: &X25519StaticSecret) -> Result<EncryptionKey> {
        let shared = owner_secret.diffie_hellman(&self.ephemeral_public);
        let wrap_key = shared.derive_encryption_key(b"carekey-keywrap");

        let key_bytes = wrap_key.decrypt(&self.encrypted_key, &self.nonce)?;

        if key_bytes.len() != 32 {
            return Err(VaultError::DecryptionError(format!(
                "invalid key length: expected 32, got {}",
                key_bytes.len()
            )));
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&key_bytes);
        Ok(EncryptionKey::from_bytes(arr))
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
}
