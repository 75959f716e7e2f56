//! Durable local store backed by SQLite.
//!
//! Persists each entity type in its own namespace (`records` keyed by
//! record type + id, `trash` for tombstones), the pending mutation queue,
//! and sync watermarks. All operations are local; network state never
//! affects them.
//!
//! Corrupt rows (unparsable stored JSON) are skipped with a logged
//! warning so a single bad entry cannot abort a scan.

use crate::error::Result;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use roadbook_core::{RecordPayload, RecordType, Timestamp, Tombstone, UserId};
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Thread-safe handle to the on-device SQLite database.
#[derive(Clone)]
pub struct LocalStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl LocalStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(8)
            .connection_timeout(Duration::from_secs(10))
            .build(manager)?;
        Self::initialize(pool)
    }

    /// Create an in-memory database (for testing).
    ///
    /// A single pooled connection, so every handle sees the same database.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        Self::initialize(pool)
    }

    fn initialize(pool: Pool<SqliteConnectionManager>) -> Result<Self> {
        let conn = pool.get()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;
        conn.execute_batch(include_str!("schema.sql"))?;
        drop(conn);

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a connection from the pool.
    pub(crate) fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Upsert a record into its namespace.
    pub fn put_record(&self, record: &RecordPayload) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        self.conn()?.execute(
            r#"
            INSERT INTO records (record_type, id, user_id, updated_at, payload)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(record_type, id) DO UPDATE SET
                user_id = excluded.user_id,
                updated_at = excluded.updated_at,
                payload = excluded.payload
            "#,
            params![
                record.record_type().as_str(),
                record.id(),
                record.user_id(),
                record.updated_at() as i64,
                payload,
            ],
        )?;
        Ok(())
    }

    /// Fetch one record, or `None` when absent or unparsable.
    pub fn get_record(&self, record_type: RecordType, id: &str) -> Result<Option<RecordPayload>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT payload FROM records WHERE record_type = ?1 AND id = ?2",
                params![record_type.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|json| decode_record(record_type, id, &json)))
    }

    /// All of a user's records of one type, most recently updated first.
    pub fn records_for_user(
        &self,
        record_type: RecordType,
        user_id: &UserId,
    ) -> Result<Vec<RecordPayload>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            r#"
            SELECT id, payload FROM records
            WHERE record_type = ?1 AND user_id = ?2
            ORDER BY updated_at DESC
            "#,
        )?;
        let rows = statement.query_map(params![record_type.as_str(), user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, json) = row?;
            if let Some(record) = decode_record(record_type, &id, &json) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Remove a record. Missing records are a no-op.
    pub fn delete_record(&self, record_type: RecordType, id: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM records WHERE record_type = ?1 AND id = ?2",
            params![record_type.as_str(), id],
        )?;
        Ok(())
    }

    /// Mark a local record as acknowledged by the server.
    ///
    /// No-op when the record has been deleted locally in the meantime.
    pub fn mark_record_synced(
        &self,
        record_type: RecordType,
        id: &str,
        now: Timestamp,
    ) -> Result<()> {
        if let Some(mut record) = self.get_record(record_type, id)? {
            record.mark_synced(now);
            self.put_record(&record)?;
        }
        Ok(())
    }

    // ========================================================================
    // Trash
    // ========================================================================

    /// Store a tombstone in the trash namespace.
    pub fn put_trash(&self, tombstone: &Tombstone) -> Result<()> {
        let payload = serde_json::to_string(tombstone)?;
        self.conn()?.execute(
            r#"
            INSERT INTO trash (record_type, id, user_id, deleted_at, expires_at, payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(record_type, id) DO UPDATE SET
                user_id = excluded.user_id,
                deleted_at = excluded.deleted_at,
                expires_at = excluded.expires_at,
                payload = excluded.payload
            "#,
            params![
                tombstone.record_type().as_str(),
                tombstone.id,
                tombstone.user_id,
                tombstone.deleted_at as i64,
                tombstone.metadata.expires_at as i64,
                payload,
            ],
        )?;
        Ok(())
    }

    /// Fetch one tombstone, or `None` when absent or unparsable.
    pub fn get_trash(&self, record_type: RecordType, id: &str) -> Result<Option<Tombstone>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT payload FROM trash WHERE record_type = ?1 AND id = ?2",
                params![record_type.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|json| decode_tombstone(record_type, id, &json)))
    }

    /// A user's unexpired tombstones, most recently deleted first.
    pub fn trash_for_user(&self, user_id: &UserId, now: Timestamp) -> Result<Vec<Tombstone>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            r#"
            SELECT record_type, id, payload FROM trash
            WHERE user_id = ?1 AND expires_at > ?2
            ORDER BY deleted_at DESC
            "#,
        )?;
        let rows = statement.query_map(params![user_id, now as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut tombstones = Vec::new();
        for row in rows {
            let (kind, id, json) = row?;
            let Some(record_type) = RecordType::parse(&kind) else {
                tracing::warn!(kind, id, "skipping trash entry with unknown record type");
                continue;
            };
            if let Some(tombstone) = decode_tombstone(record_type, &id, &json) {
                tombstones.push(tombstone);
            }
        }
        Ok(tombstones)
    }

    /// Remove a tombstone. Missing entries are a no-op.
    pub fn delete_trash(&self, record_type: RecordType, id: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM trash WHERE record_type = ?1 AND id = ?2",
            params![record_type.as_str(), id],
        )?;
        Ok(())
    }

    /// Drop tombstones whose retention window has lapsed.
    pub fn purge_expired_trash(&self, now: Timestamp) -> Result<usize> {
        let purged = self.conn()?.execute(
            "DELETE FROM trash WHERE expires_at <= ?1",
            params![now as i64],
        )?;
        if purged > 0 {
            tracing::debug!(purged, "purged expired trash entries");
        }
        Ok(purged)
    }

    // ========================================================================
    // Sync watermarks
    // ========================================================================

    /// Last server watermark seen for one record type.
    pub fn cursor(&self, record_type: RecordType) -> Result<Option<Timestamp>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?1",
                params![cursor_key(record_type)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|value| value.parse().ok()))
    }

    /// Advance the watermark for one record type.
    pub fn set_cursor(&self, record_type: RecordType, cursor: Timestamp) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO sync_meta (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![cursor_key(record_type), cursor.to_string()],
        )?;
        Ok(())
    }
}

fn cursor_key(record_type: RecordType) -> String {
    format!("cursor:{}", record_type.as_str())
}

fn decode_record(record_type: RecordType, id: &str, json: &str) -> Option<RecordPayload> {
    match serde_json::from_str(json) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(kind = %record_type, id, %err, "skipping corrupt record");
            None
        }
    }
}

fn decode_tombstone(record_type: RecordType, id: &str, json: &str) -> Option<Tombstone> {
    match serde_json::from_str(json) {
        Ok(tombstone) => Some(tombstone),
        Err(err) => {
            tracing::warn!(kind = %record_type, id, %err, "skipping corrupt trash entry");
            None
        }
    }
}
