//! # CareKey Store
//!
//! Durable actor-record persistence for the CareKey broker.
//!
//! Each actor (owner, professional, facility) persists its whole state as
//! one versioned record under its identity key. The store offers
//! read-after-write consistency per key and optimistic version checks;
//! everything else - grants, sessions, audit - lives in the record body
//! and is owned by the actor layer.
//!
//! Backends:
//!
//! - [`SqliteStore`] - primary, rusqlite with bundled SQLite
//! - [`MemoryStore`] - in-memory, for tests

pub mod error;
pub mod memory;
pub mod migration;
pub mod record;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use record::{ActorKind, ActorRecord};
pub use sqlite::SqliteStore;
pub use traits::{ActorStore, PutResult};
