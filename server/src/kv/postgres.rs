//! PostgreSQL key-value backend over sqlx.
//!
//! One `kv_entries` table holds every slot as JSONB with an optional
//! expiry. Expired rows are filtered out of every query; a sweep at
//! startup reclaims them physically.

use super::{KvError, KvStore};
use crate::clock::Clock;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// sqlx-backed [`KvStore`].
pub struct PostgresKv {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresKv {
    /// Connect to the database and run migrations.
    pub async fn connect(database_url: &str, clock: Arc<dyn Clock>) -> Result<Self, KvError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(Self { pool, clock })
    }

    /// Wrap an existing pool (used by tests).
    pub fn with_pool(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Physically remove rows whose expiry has lapsed.
    pub async fn purge_expired(&self) -> Result<u64, KvError> {
        let now = self.clock.now_ms() as i64;
        let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at_ms IS NOT NULL AND expires_at_ms <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        let purged = result.rows_affected();
        if purged > 0 {
            tracing::info!(purged, "purged expired kv entries");
        }
        Ok(purged)
    }
}

/// Escape LIKE metacharacters so a key prefix matches literally.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl KvStore for PostgresKv {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, KvError> {
        let now = self.clock.now_ms() as i64;
        let row = sqlx::query(
            r#"
            SELECT value FROM kv_entries
            WHERE key = $1 AND (expires_at_ms IS NULL OR expires_at_ms > $2)
            "#,
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get::<serde_json::Value, _>("value")))
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        expires_at_ms: Option<u64>,
    ) -> Result<(), KvError> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at_ms)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at_ms = EXCLUDED.expires_at_ms
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at_ms.map(|at| at as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, KvError> {
        let now = self.clock.now_ms() as i64;
        let pattern = format!("{}%", escape_like(prefix));
        let rows = sqlx::query(
            r#"
            SELECT key, value FROM kv_entries
            WHERE key LIKE $1 AND (expires_at_ms IS NULL OR expires_at_ms > $2)
            "#,
        )
        .bind(pattern)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }
}
