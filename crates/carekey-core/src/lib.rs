//! # CareKey Core
//!
//! Pure primitives for the CareKey access broker: scopes, grants, and the
//! audit ledger.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over access-control state. Time enters only as `now_ms`
//! parameters or via the [`Clock`] trait.
//!
//! ## Key Types
//!
//! - [`AccessScope`] - what data, which actions, for how long, why
//! - [`AccessGrant`] - a time-boxed capability with a derived expiry
//! - [`GrantSet`] - the per-owner active set (issue, revoke, sweep)
//! - [`AuditLedger`] - capped, append-only record of security events
//!
//! ## Invariants
//!
//! - A scope's duration is always within bounds; scopes are validated at
//!   construction and immutable afterwards.
//! - A grant's expiry is derived once, at issuance. Revoked or expired
//!   grants are terminal.
//! - `is_expired` is strictly `now > expires_at`, shared by the lazy
//!   check path and the periodic sweep.

pub mod audit;
pub mod error;
pub mod grant;
pub mod scope;
pub mod time;
pub mod types;

pub use audit::{AuditAction, AuditEntry, AuditEvent, AuditLedger, DEFAULT_AUDIT_CAP};
pub use error::CoreError;
pub use grant::{AccessGrant, GrantSet, Revocation, SessionToken};
pub use scope::{
    AccessAction, AccessScope, DataCategory, MAX_DURATION_SECS, MIN_DURATION_SECS,
    MIN_JUSTIFICATION_LEN,
};
pub use time::{Clock, ManualClock, SystemClock};
pub use types::{FacilityId, GrantId, OwnerId, ProfessionalId, RequestId, SessionId};
