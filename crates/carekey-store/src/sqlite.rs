//! SQLite implementation of the ActorStore trait.
//!
//! This is the primary storage backend for CareKey. It uses rusqlite with
//! bundled SQLite behind a mutex; since each actor's record is written by
//! a single serialized writer anyway, connection-level locking is enough.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::record::{ActorKind, ActorRecord};
use crate::traits::{ActorStore, PutResult};

/// SQLite-based store implementation.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| {
            StoreError::InvalidData(format!("connection mutex poisoned: {}", e))
        })?;
        f(&conn)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActorRecord> {
    let id_bytes: Vec<u8> = row.get("actor_id")?;
    let kind_tag: u8 = row.get("kind")?;
    let version: u64 = row.get("version")?;
    let created_at_ms: i64 = row.get("created_at")?;
    let updated_at_ms: i64 = row.get("updated_at")?;
    let body: Vec<u8> = row.get("body")?;

    let mut id = [0u8; 32];
    if id_bytes.len() == 32 {
        id.copy_from_slice(&id_bytes);
    }

    Ok(ActorRecord {
        id,
        kind: ActorKind::from_u8(kind_tag).unwrap_or(ActorKind::Owner),
        version,
        created_at_ms,
        updated_at_ms,
        body,
    })
}

#[async_trait]
impl ActorStore for SqliteStore {
    async fn put_record(
        &self,
        record: &ActorRecord,
        expected_version: Option<u64>,
    ) -> Result<PutResult> {
        self.with_conn(|conn| {
            let existing: Option<u64> = conn
                .query_row(
                    "SELECT version FROM actor_records WHERE actor_id = ?1",
                    params![record.id.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(expected) = expected_version {
                let current = existing.unwrap_or(0);
                if current != expected {
                    return Ok(PutResult::VersionConflict { existing: current });
                }
            }

            conn.execute(
                "INSERT INTO actor_records
                    (actor_id, kind, version, created_at, updated_at, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(actor_id) DO UPDATE SET
                    version = excluded.version,
                    updated_at = excluded.updated_at,
                    body = excluded.body",
                params![
                    record.id.as_slice(),
                    record.kind.as_u8(),
                    record.version,
                    record.created_at_ms,
                    record.updated_at_ms,
                    record.body,
                ],
            )?;

            Ok(if existing.is_some() {
                PutResult::Updated
            } else {
                PutResult::Created
            })
        })
    }

    async fn get_record(&self, id: &[u8; 32]) -> Result<Option<ActorRecord>> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    "SELECT actor_id, kind, version, created_at, updated_at, body
                     FROM actor_records WHERE actor_id = ?1",
                    params![id.as_slice()],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
    }

    async fn has_record(&self, id: &[u8; 32]) -> Result<bool> {
        self.with_conn(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM actor_records WHERE actor_id = ?1",
                params![id.as_slice()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    async fn list_records(&self, kind: Option<ActorKind>) -> Result<Vec<[u8; 32]>> {
        self.with_conn(|conn| {
            let mut ids = Vec::new();

            let collect = |rows: &mut rusqlite::Rows<'_>, ids: &mut Vec<[u8; 32]>| -> Result<()> {
                while let Some(row) = rows.next()? {
                    let bytes: Vec<u8> = row.get(0)?;
                    if bytes.len() == 32 {
                        let mut id = [0u8; 32];
                        id.copy_from_slice(&bytes);
                        ids.push(id);
                    }
                }
                Ok(())
            };

            match kind {
                Some(kind) => {
                    let mut stmt = conn
                        .prepare("SELECT actor_id FROM actor_records WHERE kind = ?1")?;
                    let mut rows = stmt.query(params![kind.as_u8()])?;
                    collect(&mut rows, &mut ids)?;
                }
                None => {
                    let mut stmt = conn.prepare("SELECT actor_id FROM actor_records")?;
                    let mut rows = stmt.query([])?;
                    collect(&mut rows, &mut ids)?;
                }
            }

            Ok(ids)
        })
    }

    async fn delete_record(&self, id: &[u8; 32]) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM actor_records WHERE actor_id = ?1",
                params![id.as_slice()],
            )?;
            Ok(changed > 0)
        })
    }
}
