//! The owner actor: grant lifecycle and data vault.
//!
//! One instance per data owner. The owner is the sole root of trust for
//! its data: it issues, checks, and revokes grants, keeps the audit
//! ledger, and is the only entity that can materialize plaintext from
//! the vault.
//!
//! All mutating operations on one instance are serialized by the actor's
//! registry lock, which is what makes the find-then-mutate sequences in
//! here race-free.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use carekey_core::{
    AccessAction, AccessGrant, AccessScope, AuditAction, AuditEntry, AuditEvent, AuditLedger,
    DataCategory, FacilityId, GrantId, GrantSet, OwnerId, ProfessionalId, RequestId,
};
use carekey_vault::{mint_session_token, DataVault, X25519PublicKey, X25519StaticSecret};

use crate::error::{ActorError, Result};

/// Marker substring that triggers emergency auto-approval.
///
/// The match is case-insensitive over caller-supplied text; it is a
/// convenience for override workflows, not an authentication mechanism,
/// and only takes effect when the owner has opted in.
pub const EMERGENCY_MARKER: &str = "EMERGENCY";

/// Outcome of an access request.
#[derive(Debug, Clone)]
pub enum AccessDecision {
    /// The request matched the owner's emergency preference and a grant
    /// was issued synchronously.
    AutoApproved(AccessGrant),
    /// The request is parked for human approval.
    Pending(RequestId),
}

/// Result of a grant validity check.
///
/// A boolean-valid result, not an error: an invalid grant is a normal
/// answer to this question.
#[derive(Debug, Clone)]
pub struct AccessCheck {
    /// Whether the grant is currently valid.
    pub valid: bool,
    /// The grant, when valid.
    pub grant: Option<AccessGrant>,
}

impl AccessCheck {
    fn invalid() -> Self {
        Self {
            valid: false,
            grant: None,
        }
    }
}

/// A stored access request awaiting human approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Who asked.
    pub professional: ProfessionalId,
    /// Through which facility.
    pub facility: FacilityId,
    /// What was asked for.
    pub scope: AccessScope,
    /// The requester's X25519 public key (for token minting on approval).
    pub professional_public: [u8; 32],
    /// When the request arrived (Unix milliseconds).
    pub requested_at_ms: i64,
}

/// Serializable owner state (everything except the in-memory secret).
#[derive(Debug, Serialize, Deserialize)]
struct OwnerState {
    id: OwnerId,
    public_key: Option<[u8; 32]>,
    wrapped_private_key: Vec<u8>,
    emergency_access_enabled: bool,
    grants: GrantSet,
    pending: HashMap<RequestId, PendingRequest>,
    vault: Option<DataVault>,
    audit: AuditLedger,
}

/// The owner actor.
pub struct OwnerActor {
    id: OwnerId,
    /// X25519 public key, set at setup.
    public_key: Option<X25519PublicKey>,
    /// The private key as wrapped by the external provider; persisted
    /// opaque, never unwrapped here.
    wrapped_private_key: Vec<u8>,
    /// The unwrapped secret, held only in memory for vault access.
    secret: Option<X25519StaticSecret>,
    emergency_access_enabled: bool,
    grants: GrantSet,
    pending: HashMap<RequestId, PendingRequest>,
    vault: Option<DataVault>,
    audit: AuditLedger,
}

impl OwnerActor {
    /// Create an owner actor with an empty ledger of the given cap.
    pub fn new(id: OwnerId, audit_cap: usize) -> Self {
        Self {
            id,
            public_key: None,
            wrapped_private_key: Vec::new(),
            secret: None,
            emergency_access_enabled: false,
            grants: GrantSet::new(),
            pending: HashMap::new(),
            vault: None,
            audit: AuditLedger::with_cap(audit_cap),
        }
    }

    /// The owner's identity.
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// The owner's public key, if set up.
    pub fn public_key(&self) -> Option<X25519PublicKey> {
        self.public_key
    }

    /// Provision keys and an empty vault.
    ///
    /// `secret` comes from the external cryptographic provider after it
    /// unwraps the owner's key material; `wrapped_private_key` is kept
    /// opaque for persistence.
    pub fn setup(
        &mut self,
        secret: X25519StaticSecret,
        wrapped_private_key: Vec<u8>,
    ) -> Result<()> {
        let public = secret.public_key();
        self.vault = Some(DataVault::provision(&public)?);
        self.public_key = Some(public);
        self.wrapped_private_key = wrapped_private_key;
        self.secret = Some(secret);
        info!(owner = %self.id, "owner set up");
        Ok(())
    }

    /// Turn emergency auto-approval on or off.
    pub fn set_emergency_access(&mut self, enabled: bool) {
        self.emergency_access_enabled = enabled;
    }

    /// Whether emergency auto-approval is enabled.
    pub fn emergency_access_enabled(&self) -> bool {
        self.emergency_access_enabled
    }

    fn secret(&self) -> Result<&X25519StaticSecret> {
        self.secret.as_ref().ok_or(ActorError::OwnerNotSetUp)
    }

    fn vault(&self) -> Result<&DataVault> {
        self.vault.as_ref().ok_or(ActorError::OwnerNotSetUp)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Grant lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Handle an access request.
    ///
    /// Auto-approves synchronously only when the justification carries the
    /// emergency marker AND the owner has enabled emergency access.
    /// Everything else is parked as an explicit pending request; the
    /// resolution mechanism (who approves, over what channel) is an
    /// extension point, surfaced through [`OwnerActor::resolve_pending`].
    pub fn request_access(
        &mut self,
        professional: ProfessionalId,
        facility: FacilityId,
        scope: AccessScope,
        professional_public: X25519PublicKey,
        now_ms: i64,
    ) -> Result<AccessDecision> {
        self.audit.append(
            AuditEvent::new(professional.to_hex(), self.id.to_hex(), AuditAction::AccessRequested)
                .with_scope(scope.clone())
                .with_facility(facility),
            now_ms,
        );

        let is_emergency = scope
            .justification()
            .to_uppercase()
            .contains(EMERGENCY_MARKER);

        if is_emergency && self.emergency_access_enabled {
            let grant =
                self.grant_access(professional, facility, scope, professional_public, now_ms)?;
            return Ok(AccessDecision::AutoApproved(grant));
        }

        let request_id = RequestId::random();
        self.pending.insert(
            request_id,
            PendingRequest {
                professional,
                facility,
                scope,
                professional_public: *professional_public.as_bytes(),
                requested_at_ms: now_ms,
            },
        );
        debug!(owner = %self.id, request = %request_id, "access request parked for approval");
        Ok(AccessDecision::Pending(request_id))
    }

    /// Issue a grant directly.
    ///
    /// Computes the expiry, mints the opaque session token through the
    /// vault KDF, inserts into the active set, and audits `access_granted`.
    pub fn grant_access(
        &mut self,
        professional: ProfessionalId,
        facility: FacilityId,
        scope: AccessScope,
        professional_public: X25519PublicKey,
        now_ms: i64,
    ) -> Result<AccessGrant> {
        let secret = self.secret()?;

        // Token derivation needs the grant id; issue with a placeholder
        // token first, then bind the real one.
        let mut grant = AccessGrant::issue(
            self.id,
            professional,
            facility,
            scope.clone(),
            carekey_core::SessionToken::from_bytes([0; 32]),
            now_ms,
        );
        grant.session_token = mint_session_token(secret, &professional_public, &grant.id);

        self.audit.append(
            AuditEvent::new(self.id.to_hex(), professional.to_hex(), AuditAction::AccessGranted)
                .with_scope(scope)
                .with_facility(facility)
                .with_detail(format!("grant {}", grant.id)),
            now_ms,
        );

        info!(owner = %self.id, grant = %grant.id, professional = %professional, "access granted");
        self.grants.insert(grant.clone());
        Ok(grant)
    }

    /// Resolve a stored pending request.
    ///
    /// Approval issues the grant as if it had been auto-approved; denial
    /// drops the request with an `access_denied` entry.
    pub fn resolve_pending(
        &mut self,
        request_id: RequestId,
        approve: bool,
        now_ms: i64,
    ) -> Result<Option<AccessGrant>> {
        let request = self
            .pending
            .remove(&request_id)
            .ok_or(ActorError::RequestNotFound(request_id))?;

        if !approve {
            self.audit.append(
                AuditEvent::new(
                    self.id.to_hex(),
                    request.professional.to_hex(),
                    AuditAction::AccessDenied,
                )
                .with_scope(request.scope)
                .with_facility(request.facility)
                .with_detail("pending request denied".to_string()),
                now_ms,
            );
            return Ok(None);
        }

        let grant = self.grant_access(
            request.professional,
            request.facility,
            request.scope,
            X25519PublicKey::from_bytes(request.professional_public),
            now_ms,
        )?;
        Ok(Some(grant))
    }

    /// Look up a stored pending request.
    pub fn pending_request(&self, request_id: &RequestId) -> Option<&PendingRequest> {
        self.pending.get(request_id)
    }

    /// Explicitly revoke a grant.
    ///
    /// Strict precondition: fails with `GrantNotFound` if the id is not
    /// in the active set.
    pub fn revoke_access(
        &mut self,
        grant_id: GrantId,
        reason: Option<String>,
        now_ms: i64,
    ) -> Result<()> {
        let grant = self
            .grants
            .revoke(&grant_id, reason, now_ms)
            .map_err(|_| ActorError::GrantNotFound(grant_id))?;

        self.audit.append(
            AuditEvent::new(
                self.id.to_hex(),
                grant.professional.to_hex(),
                AuditAction::AccessRevoked,
            )
            .with_scope(grant.scope.clone())
            .with_facility(grant.facility)
            .with_detail(format!("grant {}", grant_id)),
            now_ms,
        );

        info!(owner = %self.id, grant = %grant_id, "access revoked");
        Ok(())
    }

    /// Check whether a grant is valid, revoking lazily if it expired.
    ///
    /// The first check after expiry removes the grant and appends exactly
    /// one `access_revoked` entry; later checks see no grant and answer
    /// invalid with no further audit - idempotent.
    pub fn check_access(&mut self, grant_id: GrantId, now_ms: i64) -> AccessCheck {
        let Some(grant) = self.grants.get(&grant_id) else {
            return AccessCheck::invalid();
        };

        if grant.is_expired(now_ms) {
            // Lazy expiry: same terminal path as the sweep.
            let grant = self
                .grants
                .revoke(&grant_id, Some("expired".into()), now_ms)
                .expect("grant was just found");
            self.audit.append(
                AuditEvent::new(
                    self.id.to_hex(),
                    grant.professional.to_hex(),
                    AuditAction::AccessRevoked,
                )
                .with_scope(grant.scope.clone())
                .with_facility(grant.facility)
                .with_detail(format!("grant {} expired", grant_id)),
                now_ms,
            );
            debug!(owner = %self.id, grant = %grant_id, "expired grant revoked on check");
            return AccessCheck::invalid();
        }

        AccessCheck {
            valid: true,
            grant: Some(grant.clone()),
        }
    }

    /// All grants currently valid.
    pub fn list_active_grants(&self, now_ms: i64) -> Vec<AccessGrant> {
        self.grants
            .valid_grants(now_ms)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Revoke every expired grant. Returns how many were swept.
    ///
    /// Shares the strict `now > expires_at` definition with
    /// [`OwnerActor::check_access`], so the two paths never disagree.
    pub fn sweep(&mut self, now_ms: i64) -> usize {
        let drained = self.grants.drain_expired(now_ms);
        for grant in &drained {
            self.audit.append(
                AuditEvent::new(
                    self.id.to_hex(),
                    grant.professional.to_hex(),
                    AuditAction::AccessRevoked,
                )
                .with_scope(grant.scope.clone())
                .with_facility(grant.facility)
                .with_detail(format!("grant {} swept", grant.id)),
                now_ms,
            );
        }
        if !drained.is_empty() {
            info!(owner = %self.id, swept = drained.len(), "expiry sweep revoked grants");
        }
        drained.len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Guarded data access
    // ─────────────────────────────────────────────────────────────────────

    /// Read decrypted records in the requested categories through a grant.
    pub fn read_data(
        &mut self,
        grant_id: GrantId,
        categories: &[DataCategory],
        now_ms: i64,
    ) -> Result<BTreeMap<DataCategory, Vec<Vec<u8>>>> {
        let check = self.check_access(grant_id, now_ms);
        let Some(grant) = check.grant else {
            self.audit_denied(grant_id, "invalid grant", now_ms);
            return Err(ActorError::InvalidGrant(grant_id));
        };

        if !grant.scope.covers_action(AccessAction::Read) {
            self.audit_denied(grant_id, "read not in scope actions", now_ms);
            return Err(ActorError::ScopeViolation("read not permitted".into()));
        }
        if !grant.scope.covers_categories(categories.iter()) {
            self.audit_denied(grant_id, "categories outside scope", now_ms);
            return Err(ActorError::ScopeViolation(format!(
                "categories outside scope of grant {}",
                grant_id
            )));
        }

        let data = self
            .vault()?
            .read_categories(categories.iter().copied(), self.secret()?)?;

        self.audit.append(
            AuditEvent::new(
                grant.professional.to_hex(),
                self.id.to_hex(),
                AuditAction::DataRead,
            )
            .with_scope(grant.scope.clone())
            .with_facility(grant.facility)
            .with_detail(format!("grant {}", grant_id)),
            now_ms,
        );
        Ok(data)
    }

    /// Write a record into a category bucket through a grant.
    ///
    /// A scope holding `Write` replaces the bucket; one holding only
    /// `Append` adds to it.
    pub fn write_data(
        &mut self,
        grant_id: GrantId,
        category: DataCategory,
        payload: &[u8],
        now_ms: i64,
    ) -> Result<()> {
        let check = self.check_access(grant_id, now_ms);
        let Some(grant) = check.grant else {
            self.audit_denied(grant_id, "invalid grant", now_ms);
            return Err(ActorError::InvalidGrant(grant_id));
        };

        if !grant.scope.covers_action(AccessAction::Write) {
            self.audit_denied(grant_id, "write not in scope actions", now_ms);
            return Err(ActorError::ScopeViolation("write not permitted".into()));
        }
        if !grant.scope.covers_category(category) {
            self.audit_denied(grant_id, "category outside scope", now_ms);
            return Err(ActorError::ScopeViolation(format!(
                "category {} outside scope of grant {}",
                category, grant_id
            )));
        }

        let replace = grant.scope.actions().contains(&AccessAction::Write);
        let secret = self.secret.as_ref().ok_or(ActorError::OwnerNotSetUp)?;
        let vault = self.vault.as_mut().ok_or(ActorError::OwnerNotSetUp)?;
        if replace {
            vault.write_record(category, payload, secret, now_ms)?;
        } else {
            vault.append_record(category, payload, secret, now_ms)?;
        }

        self.audit.append(
            AuditEvent::new(
                grant.professional.to_hex(),
                self.id.to_hex(),
                AuditAction::DataWrite,
            )
            .with_scope(grant.scope.clone())
            .with_facility(grant.facility)
            .with_detail(format!("grant {} category {}", grant_id, category)),
            now_ms,
        );
        Ok(())
    }

    fn audit_denied(&mut self, grant_id: GrantId, why: &str, now_ms: i64) {
        self.audit.append(
            AuditEvent::new("unknown".to_string(), self.id.to_hex(), AuditAction::AccessDenied)
                .with_detail(format!("grant {}: {}", grant_id, why)),
            now_ms,
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Audit & persistence
    // ─────────────────────────────────────────────────────────────────────

    /// The most recent `limit` audit entries, oldest first.
    pub fn audit_log(&self, limit: usize) -> Vec<AuditEntry> {
        self.audit.recent(limit).into_iter().cloned().collect()
    }

    /// The full ledger (for tests and metrics).
    pub fn ledger(&self) -> &AuditLedger {
        &self.audit
    }

    /// Serialize the persistable state (secret excluded) to CBOR.
    pub fn snapshot(&self) -> Vec<u8> {
        let state = OwnerState {
            id: self.id,
            public_key: self.public_key.map(|k| *k.as_bytes()),
            wrapped_private_key: self.wrapped_private_key.clone(),
            emergency_access_enabled: self.emergency_access_enabled,
            grants: self.grants.clone(),
            pending: self.pending.clone(),
            vault: self.vault.clone(),
            audit: self.audit.clone(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&state, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Restore from a snapshot, re-providing the unwrapped secret.
    ///
    /// The secret itself never persists; the external provider unwraps
    /// `wrapped_private_key` and hands it back at unlock time.
    pub fn restore(bytes: &[u8], secret: Option<X25519StaticSecret>) -> Result<Self> {
        let state: OwnerState = ciborium::from_reader(bytes)
            .map_err(|e| ActorError::Core(carekey_core::CoreError::DecodingError(e.to_string())))?;
        Ok(Self {
            id: state.id,
            public_key: state.public_key.map(X25519PublicKey::from_bytes),
            wrapped_private_key: state.wrapped_private_key,
            secret,
            emergency_access_enabled: state.emergency_access_enabled,
            grants: state.grants,
            pending: state.pending,
            vault: state.vault,
            audit: state.audit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carekey_core::MIN_DURATION_SECS;

    fn scope(justification: &str, duration_secs: u32, actions: &[AccessAction]) -> AccessScope {
        AccessScope::new(
            [DataCategory::Exams],
            actions.iter().copied(),
            duration_secs,
            justification,
        )
        .unwrap()
    }

    fn set_up_owner() -> (OwnerActor, X25519PublicKey) {
        let mut owner = OwnerActor::new(OwnerId::from_bytes([1; 32]), 100);
        owner
            .setup(X25519StaticSecret::generate(), b"wrapped".to_vec())
            .unwrap();
        let professional_public = X25519StaticSecret::generate().public_key();
        (owner, professional_public)
    }

    fn ids() -> (ProfessionalId, FacilityId) {
        (
            ProfessionalId::from_bytes([2; 32]),
            FacilityId::from_bytes([3; 32]),
        )
    }

    #[test]
    fn test_emergency_request_auto_approves() {
        let (mut owner, pk) = set_up_owner();
        owner.set_emergency_access(true);
        let (professional, facility) = ids();

        let decision = owner
            .request_access(
                professional,
                facility,
                scope("EMERGENCY triage", 600, &[AccessAction::Read]),
                pk,
                1_000,
            )
            .unwrap();

        let AccessDecision::AutoApproved(grant) = decision else {
            panic!("expected auto approval");
        };
        assert_eq!(grant.expires_at_ms, 1_000 + 600_000);
        assert_eq!(owner.ledger().count_action(AuditAction::AccessGranted), 1);
    }

    #[test]
    fn test_emergency_marker_is_case_insensitive() {
        let (mut owner, pk) = set_up_owner();
        owner.set_emergency_access(true);
        let (professional, facility) = ids();

        let decision = owner
            .request_access(
                professional,
                facility,
                scope("emergency triage", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();
        assert!(matches!(decision, AccessDecision::AutoApproved(_)));
    }

    #[test]
    fn test_non_emergency_request_is_pending() {
        let (mut owner, pk) = set_up_owner();
        owner.set_emergency_access(true);
        let (professional, facility) = ids();

        let decision = owner
            .request_access(
                professional,
                facility,
                scope("routine follow-up", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();

        let AccessDecision::Pending(request_id) = decision else {
            panic!("expected pending");
        };
        assert!(owner.pending_request(&request_id).is_some());
        assert!(owner.list_active_grants(0).is_empty());
    }

    #[test]
    fn test_emergency_marker_without_preference_is_pending() {
        let (mut owner, pk) = set_up_owner();
        owner.set_emergency_access(false);
        let (professional, facility) = ids();

        let decision = owner
            .request_access(
                professional,
                facility,
                scope("EMERGENCY triage", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();
        assert!(matches!(decision, AccessDecision::Pending(_)));
    }

    #[test]
    fn test_resolve_pending_approval_issues_grant() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();

        let AccessDecision::Pending(request_id) = owner
            .request_access(
                professional,
                facility,
                scope("routine follow-up", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap()
        else {
            panic!("expected pending");
        };

        let grant = owner.resolve_pending(request_id, true, 50).unwrap().unwrap();
        assert!(owner.check_access(grant.id, 60).valid);
        assert!(owner.pending_request(&request_id).is_none());
    }

    #[test]
    fn test_resolve_pending_denial_audits() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();

        let AccessDecision::Pending(request_id) = owner
            .request_access(
                professional,
                facility,
                scope("routine follow-up", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap()
        else {
            panic!("expected pending");
        };

        let result = owner.resolve_pending(request_id, false, 50).unwrap();
        assert!(result.is_none());
        assert_eq!(owner.ledger().count_action(AuditAction::AccessDenied), 1);
    }

    #[test]
    fn test_resolve_unknown_request_fails() {
        let (mut owner, _) = set_up_owner();
        let missing = RequestId::from_bytes([9; 32]);
        assert!(matches!(
            owner.resolve_pending(missing, true, 0),
            Err(ActorError::RequestNotFound(_))
        ));
    }

    #[test]
    fn test_revoke_then_check_is_invalid_forever() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let grant = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();

        owner.revoke_access(grant.id, Some("done".into()), 100).unwrap();

        assert!(!owner.check_access(grant.id, 100).valid);
        assert!(!owner.check_access(grant.id, 1_000_000).valid);
    }

    #[test]
    fn test_revoke_unknown_grant_fails() {
        let (mut owner, _) = set_up_owner();
        let missing = GrantId::from_bytes([9; 32]);
        assert!(matches!(
            owner.revoke_access(missing, None, 0),
            Err(ActorError::GrantNotFound(_))
        ));
    }

    #[test]
    fn test_lazy_expiry_revokes_exactly_once() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let grant = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", MIN_DURATION_SECS, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();

        // 61 simulated seconds later the grant is past expiry.
        let check = owner.check_access(grant.id, 61_000);
        assert!(!check.valid);
        assert_eq!(owner.ledger().count_action(AuditAction::AccessRevoked), 1);

        // Further checks stay invalid and add no more entries.
        assert!(!owner.check_access(grant.id, 62_000).valid);
        assert_eq!(owner.ledger().count_action(AuditAction::AccessRevoked), 1);
    }

    #[test]
    fn test_sweep_agrees_with_lazy_check() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let short = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", 60, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();
        let long = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", 3_600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();

        // Exactly at expiry: not yet expired under the strict definition.
        assert_eq!(owner.sweep(60_000), 0);
        assert_eq!(owner.sweep(60_001), 1);
        assert!(!owner.check_access(short.id, 60_001).valid);
        assert!(owner.check_access(long.id, 60_001).valid);
    }

    #[test]
    fn test_read_outside_scope_denied_and_audited() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let grant = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();

        let result = owner.read_data(grant.id, &[DataCategory::Labs], 100);
        assert!(matches!(result, Err(ActorError::ScopeViolation(_))));
        assert_eq!(owner.ledger().count_action(AuditAction::AccessDenied), 1);
        assert_eq!(owner.ledger().count_action(AuditAction::DataRead), 0);
    }

    #[test]
    fn test_write_with_read_only_scope_fails_without_mutation() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let grant = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();

        let result = owner.write_data(grant.id, DataCategory::Exams, b"note", 100);
        assert!(matches!(result, Err(ActorError::ScopeViolation(_))));
        assert_eq!(owner.ledger().count_action(AuditAction::DataWrite), 0);

        // Bucket untouched: a permitted read sees nothing.
        let read_grant = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();
        let data = owner
            .read_data(read_grant.id, &[DataCategory::Exams], 100)
            .unwrap();
        assert!(data[&DataCategory::Exams].is_empty());
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let grant = owner
            .grant_access(
                professional,
                facility,
                scope(
                    "routine follow-up",
                    600,
                    &[AccessAction::Read, AccessAction::Write],
                ),
                pk,
                0,
            )
            .unwrap();

        owner
            .write_data(grant.id, DataCategory::Exams, b"mri clear", 10)
            .unwrap();
        let data = owner.read_data(grant.id, &[DataCategory::Exams], 20).unwrap();
        assert_eq!(data[&DataCategory::Exams], vec![b"mri clear".to_vec()]);
        assert_eq!(owner.ledger().count_action(AuditAction::DataWrite), 1);
        assert_eq!(owner.ledger().count_action(AuditAction::DataRead), 1);
    }

    #[test]
    fn test_append_only_scope_accumulates() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let grant = owner
            .grant_access(
                professional,
                facility,
                AccessScope::new(
                    [DataCategory::Notes],
                    [AccessAction::Read, AccessAction::Append],
                    600,
                    "progress notes",
                )
                .unwrap(),
                pk,
                0,
            )
            .unwrap();

        owner
            .write_data(grant.id, DataCategory::Notes, b"first", 10)
            .unwrap();
        owner
            .write_data(grant.id, DataCategory::Notes, b"second", 20)
            .unwrap();

        let data = owner.read_data(grant.id, &[DataCategory::Notes], 30).unwrap();
        assert_eq!(data[&DataCategory::Notes].len(), 2);
    }

    #[test]
    fn test_read_through_expired_grant_is_invalid() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let grant = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", 60, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();

        let result = owner.read_data(grant.id, &[DataCategory::Exams], 61_000);
        assert!(matches!(result, Err(ActorError::InvalidGrant(_))));
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let (mut owner, pk) = set_up_owner();
        let (professional, facility) = ids();
        let secret_bytes_grant = owner
            .grant_access(
                professional,
                facility,
                scope("routine follow-up", 600, &[AccessAction::Read]),
                pk,
                0,
            )
            .unwrap();

        let snapshot = owner.snapshot();
        let mut restored = OwnerActor::restore(&snapshot, None).unwrap();

        assert_eq!(restored.id(), owner.id());
        assert!(restored.check_access(secret_bytes_grant.id, 100).valid);
        assert_eq!(
            restored.ledger().count_action(AuditAction::AccessGranted),
            1
        );
    }
}
