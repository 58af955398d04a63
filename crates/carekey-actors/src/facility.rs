//! The facility actor: behaviors, concurrent sessions, and its own audit
//! ledger.
//!
//! A facility intermediates between professionals and owners. Unlike a
//! professional it can run many sessions at once, one per visiting
//! professional. Ending a session never revokes the attached grant; a
//! grant's lifetime is the owner's concern and outlives the session that
//! obtained it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use carekey_core::{
    AccessGrant, AuditAction, AuditEntry, AuditEvent, AuditLedger, FacilityId, OwnerId,
    ProfessionalId, SessionId,
};

use crate::error::{ActorError, Result};
use crate::linkage::LinkageIndex;

/// Facility identity and deployment details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacilityConfig {
    /// Human-readable facility name.
    pub name: String,
    /// Physical or logical location tag.
    pub location: String,
}

/// The facility's side of one professional's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitySession {
    /// Session identifier, shared with the professional side.
    pub id: SessionId,
    /// The visiting professional.
    pub professional: ProfessionalId,
    /// The owner whose data is in play, once a grant is attached.
    pub owner: Option<OwnerId>,
    /// The attached grant, if any.
    pub grant: Option<AccessGrant>,
    /// The behavior the session runs under.
    pub behavior: String,
    /// When the session started (Unix milliseconds).
    pub started_at_ms: i64,
}

/// Serializable facility state.
#[derive(Debug, Serialize, Deserialize)]
struct FacilityState {
    id: FacilityId,
    config: FacilityConfig,
    behaviors: BTreeSet<String>,
    sessions: HashMap<SessionId, FacilitySession>,
    audit: AuditLedger,
}

/// The facility actor.
pub struct FacilityActor {
    id: FacilityId,
    config: FacilityConfig,
    behaviors: BTreeSet<String>,
    sessions: HashMap<SessionId, FacilitySession>,
    audit: AuditLedger,
}

impl FacilityActor {
    /// Create a facility with an empty ledger of the given cap.
    pub fn new(id: FacilityId, config: FacilityConfig, audit_cap: usize) -> Self {
        Self {
            id,
            config,
            behaviors: BTreeSet::new(),
            sessions: HashMap::new(),
            audit: AuditLedger::with_cap(audit_cap),
        }
    }

    /// The facility's identity.
    pub fn id(&self) -> FacilityId {
        self.id
    }

    /// The facility's configuration.
    pub fn config(&self) -> &FacilityConfig {
        &self.config
    }

    /// Enable a behavior (a named service the facility offers).
    pub fn enable_behavior(&mut self, behavior: impl Into<String>) {
        self.behaviors.insert(behavior.into());
    }

    /// Disable a behavior. Running sessions under it are unaffected.
    pub fn disable_behavior(&mut self, behavior: &str) -> bool {
        self.behaviors.remove(behavior)
    }

    /// Whether a behavior is enabled.
    pub fn has_behavior(&self, behavior: &str) -> bool {
        self.behaviors.contains(behavior)
    }

    /// Number of running sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Look up a running session.
    pub fn session(&self, id: &SessionId) -> Option<&FacilitySession> {
        self.sessions.get(id)
    }

    /// Open the facility side of a session for a visiting professional.
    ///
    /// Requires an established linkage and an enabled behavior.
    pub fn start_session(
        &mut self,
        professional: ProfessionalId,
        behavior: &str,
        links: &LinkageIndex,
        now_ms: i64,
    ) -> Result<SessionId> {
        if !links.is_linked(&professional, &self.id) {
            return Err(ActorError::NotLinked {
                professional,
                facility: self.id,
            });
        }
        if !self.behaviors.contains(behavior) {
            return Err(ActorError::BehaviorNotEnabled(behavior.to_string()));
        }

        let session_id = SessionId::random();
        self.sessions.insert(
            session_id,
            FacilitySession {
                id: session_id,
                professional,
                owner: None,
                grant: None,
                behavior: behavior.to_string(),
                started_at_ms: now_ms,
            },
        );

        self.audit.append(
            AuditEvent::new(
                professional.to_hex(),
                self.id.to_hex(),
                AuditAction::SessionStarted,
            )
            .with_session(session_id)
            .with_detail(format!("behavior {behavior}")),
            now_ms,
        );
        info!(facility = %self.id, session = %session_id, professional = %professional, "session opened");
        Ok(session_id)
    }

    /// Attach an issued grant to a running session.
    pub fn attach_grant(&mut self, session_id: SessionId, grant: AccessGrant) -> Result<()> {
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(ActorError::SessionNotFound(session_id))?;
        session.owner = Some(grant.owner);
        session.grant = Some(grant);
        Ok(())
    }

    /// Close a running session and return it.
    ///
    /// The attached grant, if any, stays valid with its owner.
    pub fn end_session(&mut self, session_id: SessionId, now_ms: i64) -> Result<FacilitySession> {
        let session = self
            .sessions
            .remove(&session_id)
            .ok_or(ActorError::SessionNotFound(session_id))?;

        self.audit.append(
            AuditEvent::new(
                session.professional.to_hex(),
                self.id.to_hex(),
                AuditAction::SessionEnded,
            )
            .with_session(session_id)
            .with_detail(format!("behavior {}", session.behavior)),
            now_ms,
        );
        info!(facility = %self.id, session = %session_id, "session closed");
        Ok(session)
    }

    /// The most recent `limit` audit entries, oldest first.
    pub fn audit_log(&self, limit: usize) -> Vec<AuditEntry> {
        self.audit.recent(limit).into_iter().cloned().collect()
    }

    /// The full ledger (for tests and metrics).
    pub fn ledger(&self) -> &AuditLedger {
        &self.audit
    }

    /// Serialize the facility state, sessions and ledger included, to
    /// CBOR.
    pub fn snapshot(&self) -> Vec<u8> {
        let state = FacilityState {
            id: self.id,
            config: self.config.clone(),
            behaviors: self.behaviors.clone(),
            sessions: self.sessions.clone(),
            audit: self.audit.clone(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&state, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Restore from a snapshot.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        let state: FacilityState = ciborium::from_reader(bytes)
            .map_err(|e| ActorError::Core(carekey_core::CoreError::DecodingError(e.to_string())))?;
        Ok(Self {
            id: state.id,
            config: state.config,
            behaviors: state.behaviors,
            sessions: state.sessions,
            audit: state.audit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility() -> FacilityActor {
        let mut f = FacilityActor::new(
            FacilityId::from_bytes([3; 32]),
            FacilityConfig {
                name: "Riverside Clinic".into(),
                location: "ward-2".into(),
            },
            100,
        );
        f.enable_behavior("triage");
        f
    }

    fn linked(f: &FacilityActor, professional: ProfessionalId) -> LinkageIndex {
        let links = LinkageIndex::new();
        links.link(professional, f.id());
        links
    }

    #[test]
    fn test_start_session_requires_linkage() {
        let mut f = facility();
        let professional = ProfessionalId::from_bytes([2; 32]);
        let links = LinkageIndex::new();

        let result = f.start_session(professional, "triage", &links, 0);
        assert!(matches!(result, Err(ActorError::NotLinked { .. })));
        assert_eq!(f.session_count(), 0);
    }

    #[test]
    fn test_start_session_requires_enabled_behavior() {
        let mut f = facility();
        let professional = ProfessionalId::from_bytes([2; 32]);
        let links = linked(&f, professional);

        let result = f.start_session(professional, "imaging", &links, 0);
        assert!(matches!(result, Err(ActorError::BehaviorNotEnabled(_))));
    }

    #[test]
    fn test_concurrent_sessions_for_distinct_professionals() {
        let mut f = facility();
        let a = ProfessionalId::from_bytes([2; 32]);
        let b = ProfessionalId::from_bytes([4; 32]);
        let links = LinkageIndex::new();
        links.link(a, f.id());
        links.link(b, f.id());

        let s1 = f.start_session(a, "triage", &links, 0).unwrap();
        let s2 = f.start_session(b, "triage", &links, 0).unwrap();
        assert_ne!(s1, s2);
        assert_eq!(f.session_count(), 2);
    }

    #[test]
    fn test_disable_behavior_leaves_running_sessions() {
        let mut f = facility();
        let professional = ProfessionalId::from_bytes([2; 32]);
        let links = linked(&f, professional);
        let session = f.start_session(professional, "triage", &links, 0).unwrap();

        assert!(f.disable_behavior("triage"));
        assert!(f.session(&session).is_some());

        // New sessions under the disabled behavior are refused.
        let result = f.start_session(professional, "triage", &links, 10);
        assert!(matches!(result, Err(ActorError::BehaviorNotEnabled(_))));
    }

    #[test]
    fn test_session_lifecycle_is_audited() {
        let mut f = facility();
        let professional = ProfessionalId::from_bytes([2; 32]);
        let links = linked(&f, professional);

        let session = f.start_session(professional, "triage", &links, 0).unwrap();
        f.end_session(session, 10).unwrap();

        assert_eq!(f.ledger().count_action(AuditAction::SessionStarted), 1);
        assert_eq!(f.ledger().count_action(AuditAction::SessionEnded), 1);
        assert_eq!(f.session_count(), 0);
    }

    #[test]
    fn test_snapshot_restore_keeps_sessions_and_ledger() {
        let mut f = facility();
        let professional = ProfessionalId::from_bytes([2; 32]);
        let links = linked(&f, professional);
        let session = f.start_session(professional, "triage", &links, 0).unwrap();

        let restored = FacilityActor::restore(&f.snapshot()).unwrap();
        assert_eq!(restored.id(), f.id());
        assert_eq!(restored.config().name, "Riverside Clinic");
        assert!(restored.has_behavior("triage"));
        assert!(restored.session(&session).is_some());
        assert_eq!(
            restored.ledger().count_action(AuditAction::SessionStarted),
            1
        );
    }

    #[test]
    fn test_end_unknown_session_fails() {
        let mut f = facility();
        let missing = SessionId::from_bytes([9; 32]);
        assert!(matches!(
            f.end_session(missing, 0),
            Err(ActorError::SessionNotFound(_))
        ));
    }
}
