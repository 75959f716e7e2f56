//! Key-value persistence backends.
//!
//! The record services store each (user, id) slot as one JSON value
//! under a namespaced key, optionally with an expiry used for tombstone
//! retention. Two backends implement the same trait: an in-memory
//! DashMap store for development and tests, and PostgreSQL for
//! production.

mod memory;
mod postgres;

pub use memory::MemoryKv;
pub use postgres::PostgresKv;

use async_trait::async_trait;

/// Storage backend failure.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A flat JSON key-value store with optional per-key expiry.
///
/// Expired keys behave as absent for reads and scans; backends may
/// reclaim them lazily.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read one value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, KvError>;

    /// Upsert one value. `expires_at_ms` of `None` clears any expiry.
    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        expires_at_ms: Option<u64>,
    ) -> Result<(), KvError>;

    /// Remove one key. Missing keys are a no-op.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// All unexpired entries whose key starts with `prefix`, unordered.
    async fn list_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, KvError>;
}
