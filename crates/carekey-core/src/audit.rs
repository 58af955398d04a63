//! Append-only, capped audit ledger.
//!
//! Every security-relevant state change produces an entry. Each side of a
//! transaction keeps its own ledger (owner and facility), intentionally
//! redundant for tamper-evidence. The ledger is capped with oldest-first
//! eviction; entry sequence numbers are monotonic and never reused.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::scope::AccessScope;
use crate::types::{FacilityId, SessionId};

/// Default ledger cap.
pub const DEFAULT_AUDIT_CAP: usize = 10_000;

/// What kind of event an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// An access request arrived (auto-approved or pending).
    AccessRequested,
    /// A grant was issued.
    AccessGranted,
    /// A grant was revoked (explicitly, lazily on check, or by sweep).
    AccessRevoked,
    /// A data access was denied (scope violation or invalid grant).
    AccessDenied,
    /// Data was read through a grant.
    DataRead,
    /// Data was written through a grant.
    DataWrite,
    /// A session was started.
    SessionStarted,
    /// A session was ended.
    SessionEnded,
}

impl AuditAction {
    /// Stable string tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AccessRequested => "access_requested",
            AuditAction::AccessGranted => "access_granted",
            AuditAction::AccessRevoked => "access_revoked",
            AuditAction::AccessDenied => "access_denied",
            AuditAction::DataRead => "data_read",
            AuditAction::DataWrite => "data_write",
            AuditAction::SessionStarted => "session_started",
            AuditAction::SessionEnded => "session_ended",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in an audit ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number within this ledger.
    pub seq: u64,
    /// When the event happened (Unix milliseconds).
    pub at_ms: i64,
    /// Acting actor id (hex of whichever id type acted).
    pub actor: String,
    /// Target actor id.
    pub target: String,
    /// The action tag.
    pub action: AuditAction,
    /// Scope snapshot, when the event concerns a grant.
    pub scope: Option<AccessScope>,
    /// Facility involved, if any.
    pub facility: Option<FacilityId>,
    /// Session involved, if any.
    pub session: Option<SessionId>,
    /// Persona in effect, if any.
    pub persona: Option<String>,
    /// Free-form metadata.
    pub detail: String,
}

/// Builder-style constructor for entries; the ledger assigns seq and time.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Acting actor id.
    pub actor: String,
    /// Target actor id.
    pub target: String,
    /// The action tag.
    pub action: AuditAction,
    /// Scope snapshot.
    pub scope: Option<AccessScope>,
    /// Facility involved.
    pub facility: Option<FacilityId>,
    /// Session involved.
    pub session: Option<SessionId>,
    /// Persona in effect.
    pub persona: Option<String>,
    /// Free-form metadata.
    pub detail: String,
}

impl AuditEvent {
    /// Start an event with the required fields.
    pub fn new(actor: impl Into<String>, target: impl Into<String>, action: AuditAction) -> Self {
        Self {
            actor: actor.into(),
            target: target.into(),
            action,
            scope: None,
            facility: None,
            session: None,
            persona: None,
            detail: String::new(),
        }
    }

    /// Attach a scope snapshot.
    pub fn with_scope(mut self, scope: AccessScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Attach the facility.
    pub fn with_facility(mut self, facility: FacilityId) -> Self {
        self.facility = Some(facility);
        self
    }

    /// Attach the session.
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Attach the persona.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    /// Attach free-form detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// A capped, append-only ledger of audit entries.
///
/// Eviction is strictly oldest-first. Note: if the ledger is used as the
/// system of record, eviction can in principle drop the issuance entry of
/// a still-active grant once the cap is reached; the cap is sized so that
/// this is unlikely, but it remains a known tension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLedger {
    cap: usize,
    next_seq: u64,
    entries: VecDeque<AuditEntry>,
}

impl Default for AuditLedger {
    fn default() -> Self {
        Self::with_cap(DEFAULT_AUDIT_CAP)
    }
}

impl AuditLedger {
    /// Create a ledger with the default cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger with an explicit cap (must be nonzero).
    pub fn with_cap(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            next_seq: 1,
            entries: VecDeque::new(),
        }
    }

    /// Append an event, assigning the next sequence number.
    ///
    /// Evicts the oldest entry first if the ledger is at cap.
    pub fn append(&mut self, event: AuditEvent, now_ms: i64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }

        self.entries.push_back(AuditEntry {
            seq,
            at_ms: now_ms,
            actor: event.actor,
            target: event.target,
            action: event.action,
            scope: event.scope,
            facility: event.facility,
            session: event.session,
            persona: event.persona,
            detail: event.detail,
        });

        seq
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the ledger empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured cap.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<&AuditEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).collect()
    }

    /// Iterate over all retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    /// Count retained entries with the given action tag.
    pub fn count_action(&self, action: AuditAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }
}
