//! In-memory key-value backend over DashMap.
//!
//! Used when no `DATABASE_URL` is configured, and by the test suites.
//! Expiry is lazy: expired entries are dropped when a read or scan
//! touches them.

use super::{KvError, KvStore};
use crate::clock::Clock;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

struct Entry {
    value: serde_json::Value,
    expires_at_ms: Option<u64>,
}

impl Entry {
    fn expired(&self, now: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now >= at)
    }
}

/// DashMap-backed [`KvStore`].
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryKv {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.entries.iter().filter(|e| !e.value().expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, KvError> {
        let now = self.clock.now_ms();
        if let Some(entry) = self.entries.get(key) {
            if !entry.expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }
        // Lazy reclaim of the expired slot
        self.entries.remove(key);
        Ok(None)
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        expires_at_ms: Option<u64>,
    ) -> Result<(), KvError> {
        self.entries
            .insert(key.to_string(), Entry { value, expires_at_ms });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, KvError> {
        let now = self.clock.now_ms();
        let mut expired = Vec::new();
        let mut found = Vec::new();
        for entry in self.entries.iter() {
            if !entry.key().starts_with(prefix) {
                continue;
            }
            if entry.value().expired(now) {
                expired.push(entry.key().clone());
            } else {
                found.push((entry.key().clone(), entry.value().value.clone()));
            }
        }
        for key in expired {
            self.entries.remove(&key);
        }
        Ok(found)
    }
}
