//! Access grants and the per-owner active grant set.
//!
//! A grant is a time-boxed capability issued by a data owner. Its expiry
//! is derived from the scope duration at construction and never mutated
//! independently. Once revoked or expired a grant is terminal: it leaves
//! the active set and is never returned as valid again.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::CoreError;
use crate::scope::AccessScope;
use crate::types::{FacilityId, GrantId, OwnerId, ProfessionalId};

/// An opaque 32-byte session token bound to a grant.
///
/// Minted by the cryptographic layer via a KDF over an authenticated key
/// exchange. Core treats it as an opaque value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub [u8; 32]);

impl SessionToken {
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
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print token material in full.
        write!(f, "SessionToken({}...)", &self.to_hex()[..8])
    }
}

/// Why and when a grant was revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    /// When the revocation happened (Unix milliseconds).
    pub at_ms: i64,
    /// Optional reason.
    pub reason: Option<String>,
}

/// A time-boxed, scoped capability issued by a data owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Opaque grant identifier.
    pub id: GrantId,
    /// The owner who issued the grant.
    pub owner: OwnerId,
    /// The professional the grant was issued to.
    pub professional: ProfessionalId,
    /// The facility intermediating the access.
    pub facility: FacilityId,
    /// What the grant permits.
    pub scope: AccessScope,
    /// When the grant was issued (Unix milliseconds).
    pub issued_at_ms: i64,
    /// Derived expiry: `issued_at_ms + scope.duration_secs * 1000`.
    pub expires_at_ms: i64,
    /// Opaque session token bound to this grant.
    pub session_token: SessionToken,
    /// Set once the grant is revoked; terminal.
    pub revoked: Option<Revocation>,
}

impl AccessGrant {
    /// Issue a new grant. The expiry is computed here and nowhere else.
    pub fn issue(
        owner: OwnerId,
        professional: ProfessionalId,
        facility: FacilityId,
        scope: AccessScope,
        session_token: SessionToken,
        now_ms: i64,
    ) -> Self {
        let expires_at_ms = now_ms + i64::from(scope.duration_secs()) * 1000;
        Self {
            id: GrantId::random(),
            owner,
            professional,
            facility,
            scope,
            issued_at_ms: now_ms,
            expires_at_ms,
            session_token,
            revoked: None,
        }
    }

    /// Strictly past expiry. The lazy check and the periodic sweep share
    /// this definition so they never disagree on a grant's fate.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }

    /// Valid means: not revoked and not past expiry.
    pub fn is_valid(&self, now_ms: i64) -> bool {
        self.revoked.is_none() && !self.is_expired(now_ms)
    }
}

/// The per-owner collection of active grants.
///
/// Single-writer: the owning actor serializes all mutations, so
/// find-then-mutate sequences here are race-free.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GrantSet {
    grants: HashMap<GrantId, AccessGrant>,
    by_professional: HashMap<ProfessionalId, Vec<GrantId>>,
}

impl GrantSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active grants.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Is the set empty?
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Insert a freshly issued grant.
    pub fn insert(&mut self, grant: AccessGrant) {
        self.by_professional
            .entry(grant.professional)
            .or_default()
            .push(grant.id);
        self.grants.insert(grant.id, grant);
    }

    /// Look up an active grant.
    pub fn get(&self, id: &GrantId) -> Option<&AccessGrant> {
        self.grants.get(id)
    }

    /// Remove a grant, marking it revoked.
    ///
    /// Strict precondition: fails with [`CoreError::GrantNotFound`] if the
    /// id is not in the active set. Not an idempotent no-op.
    pub fn revoke(
        &mut self,
        id: &GrantId,
        reason: Option<String>,
        now_ms: i64,
    ) -> Result<AccessGrant, CoreError> {
        let mut grant = self
            .grants
            .remove(id)
            .ok_or(CoreError::GrantNotFound(*id))?;
        if let Some(ids) = self.by_professional.get_mut(&grant.professional) {
            ids.retain(|g| g != id);
        }
        grant.revoked = Some(Revocation { at_ms: now_ms, reason });
        Ok(grant)
    }

    /// Remove and return every grant strictly past expiry.
    pub fn drain_expired(&mut self, now_ms: i64) -> Vec<AccessGrant> {
        let expired: Vec<GrantId> = self
            .grants
            .values()
            .filter(|g| g.is_expired(now_ms))
            .map(|g| g.id)
            .collect();

        expired
            .iter()
            .filter_map(|id| self.revoke(id, Some("expired".into()), now_ms).ok())
            .collect()
    }

    /// All grants currently valid at `now_ms`.
    pub fn valid_grants(&self, now_ms: i64) -> Vec<&AccessGrant> {
        self.grants.values().filter(|g| g.is_valid(now_ms)).collect()
    }

    /// All active grant ids for a professional.
    pub fn grants_for(&self, professional: &ProfessionalId) -> Vec<&AccessGrant> {
        self.by_professional
            .get(professional)
            .map(|ids| ids.iter().filter_map(|id| self.grants.get(id)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{AccessAction, DataCategory};

    fn test_scope(duration_secs: u32) -> AccessScope {
        AccessScope::new(
            [DataCategory::Exams],
            [AccessAction::Read],
            duration_secs,
            "routine follow-up",
        )
        .unwrap()
    }

    fn test_grant(now_ms: i64, duration_secs: u32) -> AccessGrant {
        AccessGrant::issue(
            OwnerId::from_bytes([1; 32]),
            ProfessionalId::from_bytes([2; 32]),
            FacilityId::from_bytes([3; 32]),
            test_scope(duration_secs),
            SessionToken::from_bytes([9; 32]),
            now_ms,
        )
    }

    #[test]
    fn test_expiry_is_derived_from_duration() {
        let grant = test_grant(1_000_000, 600);
        assert_eq!(grant.expires_at_ms, 1_000_000 + 600_000);
    }

    #[test]
    fn test_expiry_is_strict() {
        let grant = test_grant(0, 60);
        assert!(!grant.is_expired(60_000)); // exactly at expiry: still valid
        assert!(grant.is_expired(60_001));
    }

    #[test]
    fn test_revoke_removes_from_set() {
        let mut set = GrantSet::new();
        let grant = test_grant(0, 600);
        let id = grant.id;
        set.insert(grant);

        let revoked = set.revoke(&id, Some("done".into()), 1000).unwrap();
        assert!(revoked.revoked.is_some());
        assert!(set.get(&id).is_none());
    }

    #[test]
    fn test_revoke_absent_is_error() {
        let mut set = GrantSet::new();
        let missing = GrantId::from_bytes([7; 32]);
        assert!(matches!(
            set.revoke(&missing, None, 0),
            Err(CoreError::GrantNotFound(_))
        ));
    }

    #[test]
    fn test_drain_expired_only_takes_expired() {
        let mut set = GrantSet::new();
        let short = test_grant(0, 60);
        let long = test_grant(0, 3600);
        let long_id = long.id;
        set.insert(short);
        set.insert(long);

        let drained = set.drain_expired(61_000);
        assert_eq!(drained.len(), 1);
        assert!(drained[0].revoked.is_some());
        assert!(set.get(&long_id).is_some());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_by_professional_index_tracks_revokes() {
        let mut set = GrantSet::new();
        let grant = test_grant(0, 600);
        let professional = grant.professional;
        let id = grant.id;
        set.insert(grant);
        assert_eq!(set.grants_for(&professional).len(), 1);

        set.revoke(&id, None, 0).unwrap();
        assert!(set.grants_for(&professional).is_empty());
    }

    #[test]
    fn test_session_token_debug_is_truncated() {
        let token = SessionToken::from_bytes([0xff; 32]);
        let debug = format!("{:?}", token);
        assert!(debug.len() < 40);
    }
}
