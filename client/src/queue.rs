//! Durably persisted pending-mutation queue.
//!
//! Offline writes land here before they land on the server. Items are
//! drained in enqueue order; the queue row is removed only after the
//! matching network call succeeds, so a crash mid-drain re-presents the
//! item on the next drain.

use crate::error::Result;
use crate::store::LocalStore;
use roadbook_core::{MutationAction, PendingMutation, RecordType, Timestamp};
use rusqlite::params;

/// FIFO queue of pending mutations, persisted in the local store.
#[derive(Clone)]
pub struct SyncQueue {
    store: LocalStore,
}

impl SyncQueue {
    /// Wrap the queue tables of a local store.
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Append a mutation with zero retries. Returns the assigned queue id.
    pub fn enqueue(
        &self,
        action: MutationAction,
        record_type: RecordType,
        target_id: &str,
        payload: Option<&serde_json::Value>,
        timestamp: Timestamp,
    ) -> Result<i64> {
        let conn = self.store.conn()?;
        conn.execute(
            r#"
            INSERT INTO sync_queue (action, record_type, target_id, payload, timestamp, retries)
            VALUES (?1, ?2, ?3, ?4, ?5, 0)
            "#,
            params![
                action.as_str(),
                record_type.as_str(),
                target_id,
                payload.map(|p| p.to_string()),
                timestamp as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The whole queue in strict enqueue order.
    ///
    /// Rows with an unknown action or record type are skipped with a
    /// warning rather than aborting the snapshot.
    pub fn snapshot(&self) -> Result<Vec<PendingMutation>> {
        let conn = self.store.conn()?;
        let mut statement = conn.prepare(
            r#"
            SELECT id, action, record_type, target_id, payload, timestamp, retries, last_error
            FROM sync_queue
            ORDER BY id ASC
            "#,
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, u32>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, action, kind, target_id, payload, timestamp, retries, last_error) = row?;
            let Some(action) = MutationAction::parse(&action) else {
                tracing::warn!(id, action, "skipping queue row with unknown action");
                continue;
            };
            let Some(record_type) = RecordType::parse(&kind) else {
                tracing::warn!(id, kind, "skipping queue row with unknown record type");
                continue;
            };
            let payload = match payload {
                Some(json) => match serde_json::from_str(&json) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        tracing::warn!(id, %err, "skipping queue row with corrupt payload");
                        continue;
                    }
                },
                None => None,
            };
            items.push(PendingMutation {
                id,
                action,
                record_type,
                target_id,
                payload,
                timestamp: timestamp as Timestamp,
                retries,
                last_error,
            });
        }
        Ok(items)
    }

    /// Remove a queue item after it succeeded or was dropped.
    pub fn remove(&self, id: i64) -> Result<()> {
        self.store
            .conn()?
            .execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Persist an item's bumped retry count and last error.
    pub fn save_retry(&self, item: &PendingMutation) -> Result<()> {
        self.store.conn()?.execute(
            "UPDATE sync_queue SET retries = ?1, last_error = ?2 WHERE id = ?3",
            params![item.retries, item.last_error, item.id],
        )?;
        Ok(())
    }

    /// Current queue depth.
    pub fn len(&self) -> Result<usize> {
        let count: i64 =
            self.store
                .conn()?
                .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
