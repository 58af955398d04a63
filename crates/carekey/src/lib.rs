//! # CareKey
//!
//! Capability-based access control for encrypted health records:
//! time-boxed scoped grants, three-party sessions, and guarded
//! execution.
//!
//! ## Overview
//!
//! CareKey brokers access between three actor kinds:
//!
//! - **Owners** hold encrypted record vaults and are the sole authority
//!   over who reads them. They issue, check, and revoke grants.
//! - **Professionals** request access and operate under personas, one
//!   session at a time.
//! - **Facilities** intermediate, running many concurrent sessions and
//!   keeping their own audit ledgers.
//!
//! ## Key Concepts
//!
//! - **Grant**: a time-boxed capability. Expiry is derived once at
//!   issuance; revocation is terminal.
//! - **Scope**: categories + actions + duration + justification. Data
//!   access never exceeds it.
//! - **Session**: the professional/facility pairing a grant travels
//!   through. Ending a session does not revoke the grant.
//! - **Audit ledger**: capped, append-only, kept independently by owner
//!   and facility.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use carekey::{CareKey, CareKeyConfig, HandshakeRequest};
//! use carekey::core::SystemClock;
//! use carekey::store::SqliteStore;
//! use carekey::vault::X25519StaticSecret;
//!
//! async fn example() {
//!     let store = SqliteStore::open("carekey.db").unwrap();
//!     let broker = CareKey::new(store, Arc::new(SystemClock), CareKeyConfig::default());
//!
//!     let secret = X25519StaticSecret::generate();
//!     let owner = broker
//!         .register_owner("alice", secret, b"wrapped".to_vec(), true)
//!         .await
//!         .unwrap();
//!
//!     // Register a professional and a facility, link them, then run the
//!     // handshake with a scope to obtain a grant:
//!     // let session = broker.establish_session(&request).await.unwrap();
//!     let _ = owner;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `carekey::core` - scopes, grants, audit ledger, clock
//! - `carekey::vault` - X25519/ChaCha20-Poly1305 envelope encryption
//! - `carekey::store` - storage abstraction and SQLite
//! - `carekey::actors` - actors, coordinator, guardrails

pub mod broker;
pub mod config;
pub mod error;
pub mod sweeper;

// Re-export component crates
pub use carekey_actors as actors;
pub use carekey_core as core;
pub use carekey_store as store;
pub use carekey_vault as vault;

// Re-export main types for convenience
pub use broker::CareKey;
pub use config::CareKeyConfig;
pub use error::{CareKeyError, Result};
pub use sweeper::{spawn_sweeper, sweep_all, SweeperHandle};

// Re-export commonly used component types
pub use carekey_actors::{
    AccessDecision, ActorError, EstablishedSession, FacilityConfig, Guardrail, GuardrailDecision,
    HandshakeRequest, Persona,
};
pub use carekey_core::{
    AccessAction, AccessGrant, AccessScope, AuditAction, AuditEntry, Clock, DataCategory,
    FacilityId, GrantId, ManualClock, OwnerId, ProfessionalId, RequestId, SessionId, SystemClock,
};
