//! Persisted actor records.
//!
//! Every actor's durable state is a single versioned record keyed by the
//! actor's identity. The body is an opaque CBOR blob owned by the actor
//! layer; the store only sees the envelope.

use serde::{Deserialize, Serialize};

/// Discriminator for the three actor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActorKind {
    /// A data owner.
    Owner = 1,
    /// A credentialed professional.
    Professional = 2,
    /// A care-delivery facility.
    Facility = 3,
}

impl ActorKind {
    /// Stable numeric tag (persisted in SQLite).
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Parse from the stable numeric tag.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ActorKind::Owner),
            2 => Some(ActorKind::Professional),
            3 => Some(ActorKind::Facility),
            _ => None,
        }
    }
}

/// A versioned actor record: identity, kind, timestamps, opaque body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRecord {
    /// The actor's 32-byte identity key.
    pub id: [u8; 32],
    /// The actor kind.
    pub kind: ActorKind,
    /// Monotonic version, bumped on every put.
    pub version: u64,
    /// When the record was first created (Unix milliseconds).
    pub created_at_ms: i64,
    /// When the record was last updated (Unix milliseconds).
    pub updated_at_ms: i64,
    /// The actor's serialized state (CBOR).
    pub body: Vec<u8>,
}

impl ActorRecord {
    /// Build a first-version record.
    pub fn new(id: [u8; 32], kind: ActorKind, body: Vec<u8>, now_ms: i64) -> Self {
        Self {
            id,
            kind,
            version: 1,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            body,
        }
    }

    /// Produce the successor record with a new body.
    pub fn next(&self, body: Vec<u8>, now_ms: i64) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            version: self.version + 1,
            created_at_ms: self.created_at_ms,
            updated_at_ms: now_ms,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_kind_tag_roundtrip() {
        for kind in [ActorKind::Owner, ActorKind::Professional, ActorKind::Facility] {
            assert_eq!(ActorKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(ActorKind::from_u8(0), None);
    }

    #[test]
    fn test_next_bumps_version_keeps_created_at() {
        let record = ActorRecord::new([1; 32], ActorKind::Owner, vec![1, 2], 100);
        let next = record.next(vec![3], 200);

        assert_eq!(next.version, 2);
        assert_eq!(next.created_at_ms, 100);
        assert_eq!(next.updated_at_ms, 200);
        assert_eq!(next.body, vec![3]);
    }
}
