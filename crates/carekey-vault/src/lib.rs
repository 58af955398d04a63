//! # CareKey Vault
//!
//! Envelope encryption, key wrapping, and session tokens.
//!
//! ## Encryption Model
//!
//! Vault content uses a two-layer key model:
//!
//! 1. **Content Key**: a symmetric key (ChaCha20-Poly1305) that seals
//!    every record in the vault
//! 2. **Key Wrap**: the content key is wrapped to the owner's X25519
//!    public key via ephemeral ECDH
//!
//! The owner's secret is therefore required to materialize any plaintext;
//! the serialized vault is safe to hand to the storage layer as-is.
//!
//! ## Session Tokens
//!
//! Session tokens bound to grants are derived with a Blake3 KDF over an
//! X25519 exchange between the owner's and the professional's static
//! keys plus a random salt. See [`mint_session_token`].

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keywrap;
pub mod token;
pub mod vault;

pub use crypto::{
    EncryptionKey, EncryptionNonce, EphemeralKeyPair, SharedKey, X25519PublicKey,
    X25519StaticSecret,
};
pub use envelope::{SealFormat, SealedRecord};
pub use error::{Result, VaultError};
pub use keywrap::WrappedKey;
pub use token::{mint_session_token, mint_session_token_with_salt};
pub use vault::DataVault;
