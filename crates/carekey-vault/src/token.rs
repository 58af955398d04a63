//! Session token minting.
//!
//! A session token is an opaque 32-byte value bound to a grant. It is
//! derived with a KDF over an authenticated X25519 exchange between the
//! owner's and the professional's static keys, plus a random salt, so it
//! is unpredictable to anyone without one of the secrets. It is never a
//! concatenation of guessable parts.

use rand::RngCore;

use carekey_core::{GrantId, SessionToken};

use crate::crypto::{X25519PublicKey, X25519StaticSecret};

/// Mint a session token for a grant.
///
/// Performed on the owner side: `owner_secret` is the owner's static key,
/// `professional_public` the recipient's. The same token can be recomputed
/// by the professional only if the salt is shared alongside the grant.
pub fn mint_session_token(
    owner_secret: &X25519StaticSecret,
    professional_public: &X25519PublicKey,
    grant_id: &GrantId,
) -> SessionToken {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    mint_session_token_with_salt(owner_secret, professional_public, grant_id, &salt)
}

/// Deterministic variant used when the salt is already fixed.
pub fn mint_session_token_with_salt(
    owner_secret: &X25519StaticSecret,
    professional_public: &X25519PublicKey,
    grant_id: &GrantId,
    salt: &[u8],
) -> SessionToken {
    let shared = owner_secret.diffie_hellman(professional_public);
    SessionToken::from_bytes(shared.derive_token(grant_id.as_bytes(), salt))
}
