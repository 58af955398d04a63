//! Error types for the actor layer.
//!
//! All of these are local, recoverable conditions: callers are expected
//! to branch on them, not crash. Infrastructure failures surface from the
//! store layer, never from here.

use thiserror::Error;

use carekey_core::{CoreError, FacilityId, GrantId, ProfessionalId, RequestId, SessionId};
use carekey_vault::VaultError;

/// Errors that can occur during actor operations.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The professional is not linked to the facility.
    #[error("professional {professional} is not linked to facility {facility}")]
    NotLinked {
        professional: ProfessionalId,
        facility: FacilityId,
    },

    /// The facility has not enabled the requested behavior.
    #[error("behavior not enabled: {0}")]
    BehaviorNotEnabled(String),

    /// The professional cannot assume the requested persona.
    #[error("persona not available: {0}")]
    PersonaNotAvailable(String),

    /// A session-scoped operation was called with no open session.
    #[error("no active session")]
    NoActiveSession,

    /// The session id is not open on this actor.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Grant id absent from the active set.
    #[error("grant not found: {0}")]
    GrantNotFound(GrantId),

    /// Grant exists but is no longer valid for data access.
    #[error("grant is not valid: {0}")]
    InvalidGrant(GrantId),

    /// Requested categories or action not covered by the grant scope.
    #[error("scope violation: {0}")]
    ScopeViolation(String),

    /// The request needs human approval; an explicit status, not a defect.
    #[error("approval pending: {request_id}")]
    ApprovalPending { request_id: RequestId },

    /// Pending request id is unknown.
    #[error("pending request not found: {0}")]
    RequestNotFound(RequestId),

    /// The actor identity is not registered.
    #[error("actor not registered: {0}")]
    ActorNotRegistered(String),

    /// The owner actor has not completed setup.
    #[error("owner is not set up")]
    OwnerNotSetUp,

    /// A cross-actor call exceeded its deadline.
    #[error("cross-actor call timed out: {0}")]
    Timeout(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Vault error.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

/// Result type for actor operations.
pub type Result<T> = std::result::Result<T, ActorError>;
