//! ActorStore trait: the abstract interface for actor-record persistence.
//!
//! This trait keeps the broker storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests). The store is a plain
//! key-value surface with read-after-write consistency per key; all
//! access-control logic lives above it.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{ActorKind, ActorRecord};

/// Result of putting a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutResult {
    /// No record existed; this one was created.
    Created,
    /// An existing record was replaced.
    Updated,
    /// The caller's expected version was stale.
    VersionConflict {
        /// The version actually in the store.
        existing: u64,
    },
}

/// Async interface for actor-record persistence.
///
/// # Design Notes
///
/// - **Single record per actor**: each actor's whole state is one
///   versioned record under its identity key.
/// - **Optimistic versioning**: `put_record` with `expected_version`
///   returns `VersionConflict` instead of silently overwriting. The actor
///   layer already serializes writers per identity, so a conflict here
///   indicates a bug, not a normal race.
#[async_trait]
pub trait ActorStore: Send + Sync {
    /// Put an actor record.
    ///
    /// - `expected_version: None` means "create or replace unconditionally".
    /// - `expected_version: Some(v)` succeeds only if the stored version
    ///   is exactly `v` (or the record is absent and `v == 0`).
    async fn put_record(
        &self,
        record: &ActorRecord,
        expected_version: Option<u64>,
    ) -> Result<PutResult>;

    /// Get an actor record by identity key.
    async fn get_record(&self, id: &[u8; 32]) -> Result<Option<ActorRecord>>;

    /// Check if a record exists.
    async fn has_record(&self, id: &[u8; 32]) -> Result<bool>;

    /// List identity keys, optionally filtered by actor kind.
    async fn list_records(&self, kind: Option<ActorKind>) -> Result<Vec<[u8; 32]>>;

    /// Delete a record. Returns whether anything was removed.
    async fn delete_record(&self, id: &[u8; 32]) -> Result<bool>;
}
