//! Strong identifier types for CareKey.
//!
//! All identifiers are 32-byte newtypes to prevent misuse at compile time.
//! Actor identifiers (owner, professional, facility) are derived from the
//! actor's identity key and a label; grant, session, and request
//! identifiers are random and opaque.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $tag:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }

            /// Generate a random identifier.
            pub fn random() -> Self {
                use rand::RngCore;
                let mut bytes = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// The zero identifier (sentinel).
            pub const ZERO: Self = Self([0u8; 32]);
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }
    };
}

define_id!(
    /// Identifier of a data owner (the data sovereign).
    ///
    /// Derived from the owner's identity key with [`OwnerId::derive`].
    OwnerId,
    "OwnerId"
);

define_id!(
    /// Identifier of a credentialed professional.
    ProfessionalId,
    "ProfessionalId"
);

define_id!(
    /// Identifier of a care-delivery facility.
    FacilityId,
    "FacilityId"
);

define_id!(
    /// Opaque identifier of an access grant.
    GrantId,
    "GrantId"
);

define_id!(
    /// Identifier of a professional or facility session.
    SessionId,
    "SessionId"
);

define_id!(
    /// Identifier of a pending access request awaiting human approval.
    RequestId,
    "RequestId"
);

fn derive_actor_id(domain: &str, identity_key: &[u8; 32], label: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_bytes());
    hasher.update(identity_key);
    hasher.update(b":");
    hasher.update(label.as_bytes());
    *hasher.finalize().as_bytes()
}

impl OwnerId {
    /// Derive an owner id from an identity public key and a label.
    pub fn derive(identity_key: &[u8; 32], label: &str) -> Self {
        Self(derive_actor_id("carekey-owner-v0:", identity_key, label))
    }
}

impl ProfessionalId {
    /// Derive a professional id from an identity public key and a label.
    pub fn derive(identity_key: &[u8; 32], label: &str) -> Self {
        Self(derive_actor_id("carekey-professional-v0:", identity_key, label))
    }
}

impl FacilityId {
    /// Derive a facility id from an identity public key and a label.
    pub fn derive(identity_key: &[u8; 32], label: &str) -> Self {
        Self(derive_actor_id("carekey-facility-v0:", identity_key, label))
    }
}
