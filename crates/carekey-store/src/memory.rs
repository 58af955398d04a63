//! In-memory implementation of the ActorStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{ActorKind, ActorRecord};
use crate::traits::{ActorStore, PutResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    records: RwLock<HashMap<[u8; 32], ActorRecord>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActorStore for MemoryStore {
    async fn put_record(
        &self,
        record: &ActorRecord,
        expected_version: Option<u64>,
    ) -> Result<PutResult> {
        let mut records = self.records.write().unwrap();

        let existing_version = records.get(&record.id).map(|r| r.version);

        if let Some(expected) = expected_version {
            let existing = existing_version.unwrap_or(0);
            if existing != expected {
                return Ok(PutResult::VersionConflict { existing });
            }
        }

        let result = if existing_version.is_some() {
            PutResult::Updated
        } else {
            PutResult::Created
        };
        records.insert(record.id, record.clone());
        Ok(result)
    }

    async fn get_record(&self, id: &[u8; 32]) -> Result<Option<ActorRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.get(id).cloned())
    }

    async fn has_record(&self, id: &[u8; 32]) -> Result<bool> {
        let records = self.records.read().unwrap();
        Ok(records.contains_key(id))
    }

    async fn list_records(&self, kind: Option<ActorKind>) -> Result<Vec<[u8; 32]>> {
        let records = self.records.read().unwrap();
        Ok(records
            .values()
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .map(|r| r.id)
            .collect())
    }

    async fn delete_record(&self, id: &[u8; 32]) -> Result<bool> {
        let mut records = self.records.write().unwrap();
        Ok(records.remove(id).is_some())
    }
}
