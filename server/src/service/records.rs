//! The cloud record service: authoritative storage for one entity type.
//!
//! Each (user, id) pair owns one storage slot holding either the active
//! record or its tombstone. Soft delete mutates the slot in place into a
//! tombstone carrying a full backup and a 30-day expiry; restore writes
//! the backup back. A per-user derived index of ids makes listing cheap
//! and self-heals when it drifts from the authoritative slots.
//!
//! Cross-entity lifecycle rules do NOT live here: this layer will
//! happily store a mileage log pointing at a deleted trip. The request
//! handlers composing these services enforce those guards.

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::kv::KvStore;
use roadbook_core::{
    lifecycle, Error as DomainError, RecordPayload, RecordSlot, RecordType, Timestamp, Tombstone,
    TrashSummary,
};
use std::sync::Arc;

/// Authoritative store for one record type over a KV backend.
#[derive(Clone)]
pub struct RecordService {
    kind: RecordType,
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl RecordService {
    pub fn new(kind: RecordType, kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { kind, kv, clock }
    }

    /// The entity type this service owns.
    pub fn kind(&self) -> RecordType {
        self.kind
    }

    fn slot_key(&self, user_id: &str, id: &str) -> String {
        format!("rec:{}:{}:{}", self.kind.as_str(), user_id, id)
    }

    fn slot_prefix(&self, user_id: &str) -> String {
        format!("rec:{}:{}:", self.kind.as_str(), user_id)
    }

    fn index_key(&self, user_id: &str) -> String {
        format!("idx:{}:{}", self.kind.as_str(), user_id)
    }

    fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    // ========================================================================
    // Slot access
    // ========================================================================

    /// The raw slot for (user, id): active record, tombstone, or `None`.
    pub async fn get_slot(&self, user_id: &str, id: &str) -> Result<Option<RecordSlot>> {
        let Some(value) = self.kv.get(&self.slot_key(user_id, id)).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(slot) => Ok(Some(slot)),
            Err(err) => {
                tracing::warn!(kind = %self.kind, user_id, id, %err, "corrupt record slot");
                Ok(None)
            }
        }
    }

    /// The active record, never a tombstone.
    pub async fn get(&self, user_id: &str, id: &str) -> Result<Option<RecordPayload>> {
        Ok(self
            .get_slot(user_id, id)
            .await?
            .and_then(|slot| match slot {
                RecordSlot::Active(payload) => Some(payload),
                RecordSlot::Tombstone(_) => None,
            }))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Upsert a record: clears any tombstone state in the slot, stamps
    /// `updatedAt`, and drops any retention expiry.
    pub async fn put(&self, mut payload: RecordPayload) -> Result<RecordPayload> {
        if payload.record_type() != self.kind {
            return Err(AppError::Domain(DomainError::TypeMismatch {
                expected: self.kind,
                got: payload.record_type(),
            }));
        }
        let now = self.now();
        payload.touch(now);

        let key = self.slot_key(payload.user_id(), payload.id());
        let value = serde_json::to_value(&payload).map_err(crate::kv::KvError::from)?;
        self.kv.put(&key, value, None).await?;
        self.index_add(payload.user_id(), payload.id()).await;
        Ok(payload)
    }

    /// Soft-delete: overwrite the slot with a tombstone carrying the
    /// backup payload, expiring after the retention window.
    ///
    /// Absent slots are a no-op (`None`); deleting an already-deleted
    /// record returns the existing tombstone unchanged, so repeat
    /// deletes are idempotent.
    pub async fn soft_delete(
        &self,
        user_id: &str,
        id: &str,
        deleted_by: &str,
    ) -> Result<Option<Tombstone>> {
        let slot = self.get_slot(user_id, id).await?;
        let payload = match slot {
            None => return Ok(None),
            Some(RecordSlot::Tombstone(existing)) => return Ok(Some(existing)),
            Some(RecordSlot::Active(payload)) => payload,
        };

        let backup = lifecycle::backup_for_delete(payload);
        let tombstone = Tombstone::new(backup, deleted_by, self.now());
        let value = serde_json::to_value(&tombstone).map_err(crate::kv::KvError::from)?;
        self.kv
            .put(
                &self.slot_key(user_id, id),
                value,
                Some(tombstone.metadata.expires_at),
            )
            .await?;
        tracing::debug!(kind = %self.kind, user_id, id, "record tombstoned");
        Ok(Some(tombstone))
    }

    /// Restore a tombstoned record from its backup, stripping deletion
    /// markers and refreshing `updatedAt`.
    pub async fn restore(&self, user_id: &str, id: &str) -> Result<RecordPayload> {
        match self.get_slot(user_id, id).await? {
            None => Err(AppError::Domain(DomainError::RecordNotFound(id.into()))),
            Some(RecordSlot::Active(_)) => {
                Err(AppError::Domain(DomainError::NotDeleted(id.into())))
            }
            Some(RecordSlot::Tombstone(tombstone)) => {
                let mut payload = tombstone.backup;
                payload.touch(self.now());

                let key = self.slot_key(user_id, id);
                let value = serde_json::to_value(&payload).map_err(crate::kv::KvError::from)?;
                self.kv.put(&key, value, None).await?;
                self.index_add(user_id, id).await;
                tracing::debug!(kind = %self.kind, user_id, id, "record restored from trash");
                Ok(payload)
            }
        }
    }

    /// Remove the slot unconditionally, bypassing retention. Idempotent:
    /// purging a missing slot still succeeds.
    pub async fn permanent_delete(&self, user_id: &str, id: &str) -> Result<()> {
        self.kv.delete(&self.slot_key(user_id, id)).await?;
        self.index_remove(user_id, id).await;
        Ok(())
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// List a user's records.
    ///
    /// Without `since`: active records only. With `since`: every slot
    /// whose watermark is after it, tombstones included, so deletions
    /// propagate during delta sync.
    pub async fn list(&self, user_id: &str, since: Option<Timestamp>) -> Result<Vec<RecordSlot>> {
        let slots = self.user_slots(user_id).await?;
        let mut result: Vec<RecordSlot> = match since {
            None => slots
                .into_iter()
                .filter(|slot| !slot.is_tombstone())
                .collect(),
            Some(since) => slots
                .into_iter()
                .filter(|slot| slot.watermark() > since)
                .collect(),
        };
        result.sort_by_key(|slot| std::cmp::Reverse(slot.watermark()));
        Ok(result)
    }

    /// A user's tombstones as normalized summaries, most recently
    /// deleted first.
    pub async fn list_trash(&self, user_id: &str) -> Result<Vec<TrashSummary>> {
        let mut summaries: Vec<TrashSummary> = self
            .user_slots(user_id)
            .await?
            .into_iter()
            .filter_map(|slot| slot.tombstone().map(Tombstone::summary))
            .collect();
        summaries.sort_by_key(|summary| std::cmp::Reverse(summary.deleted_at));
        Ok(summaries)
    }

    // ========================================================================
    // Derived index
    // ========================================================================

    /// All of a user's slots, resolved through the derived id index.
    ///
    /// The index self-heals: a missing index is rebuilt from an
    /// authoritative prefix scan, and stale ids (whose slot has been
    /// purged or expired) are pruned during the read. Index repair never
    /// fails the read path.
    async fn user_slots(&self, user_id: &str) -> Result<Vec<RecordSlot>> {
        let ids = match self.read_index(user_id).await? {
            Some(ids) => ids,
            None => self.rebuild_index(user_id).await?,
        };

        let mut slots = Vec::with_capacity(ids.len());
        let mut live_ids = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.get_slot(user_id, id).await? {
                Some(slot) => {
                    live_ids.push(id.clone());
                    slots.push(slot);
                }
                None => {
                    tracing::debug!(kind = %self.kind, user_id, id, "pruning stale index entry");
                }
            }
        }

        if live_ids.len() != ids.len() {
            self.write_index(user_id, &live_ids).await;
        }
        Ok(slots)
    }

    async fn read_index(&self, user_id: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.kv.get(&self.index_key(user_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(ids) => Ok(Some(ids)),
            Err(err) => {
                tracing::warn!(kind = %self.kind, user_id, %err, "corrupt index, rebuilding");
                Ok(None)
            }
        }
    }

    /// Rebuild the id index from the authoritative slots.
    async fn rebuild_index(&self, user_id: &str) -> Result<Vec<String>> {
        let prefix = self.slot_prefix(user_id);
        let entries = self.kv.list_prefix(&prefix).await?;
        let ids: Vec<String> = entries
            .into_iter()
            .map(|(key, _)| key[prefix.len()..].to_string())
            .collect();
        tracing::info!(kind = %self.kind, user_id, count = ids.len(), "rebuilt record index");
        self.write_index(user_id, &ids).await;
        Ok(ids)
    }

    async fn write_index(&self, user_id: &str, ids: &[String]) {
        let Ok(value) = serde_json::to_value(ids) else {
            return;
        };
        if let Err(err) = self.kv.put(&self.index_key(user_id), value, None).await {
            tracing::warn!(kind = %self.kind, user_id, %err, "failed to write record index");
        }
    }

    async fn index_add(&self, user_id: &str, id: &str) {
        match self.read_index(user_id).await {
            Ok(Some(mut ids)) => {
                if !ids.iter().any(|existing| existing == id) {
                    ids.push(id.to_string());
                    self.write_index(user_id, &ids).await;
                }
            }
            Ok(None) => {
                if let Err(err) = self.rebuild_index(user_id).await {
                    tracing::warn!(kind = %self.kind, user_id, %err, "index rebuild failed");
                }
            }
            Err(err) => {
                tracing::warn!(kind = %self.kind, user_id, %err, "failed to read record index");
            }
        }
    }

    async fn index_remove(&self, user_id: &str, id: &str) {
        if let Ok(Some(mut ids)) = self.read_index(user_id).await {
            let before = ids.len();
            ids.retain(|existing| existing != id);
            if ids.len() != before {
                self.write_index(user_id, &ids).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::kv::MemoryKv;
    use roadbook_core::{Trip, TRASH_RETENTION_MS};

    fn test_service() -> (RecordService, Arc<ManualClock>) {
        let clock = ManualClock::at(1_000);
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        (
            RecordService::new(RecordType::Trip, kv, clock.clone()),
            clock,
        )
    }

    fn test_trip(id: &str) -> RecordPayload {
        let mut trip = Trip::new(id, "user-1", "2024-03-01", 500);
        trip.total_miles = 42.0;
        RecordPayload::Trip(trip)
    }

    #[tokio::test]
    async fn put_stamps_updated_at() {
        let (service, _) = test_service();
        let stored = service.put(test_trip("trip-1")).await.unwrap();
        assert_eq!(stored.updated_at(), 1_000);

        let fetched = service.get("user-1", "trip-1").await.unwrap().unwrap();
        assert_eq!(fetched.id(), "trip-1");
    }

    #[tokio::test]
    async fn put_rejects_foreign_record_type() {
        let (service, _) = test_service();
        let log = roadbook_core::MileageLog::new("m-1", "user-1", "2024-03-01", 0.0, 10.0, 500);
        let err = service.put(RecordPayload::Mileage(log)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn get_never_returns_a_tombstone() {
        let (service, _) = test_service();
        service.put(test_trip("trip-1")).await.unwrap();
        service.soft_delete("user-1", "trip-1", "user-1").await.unwrap();

        assert!(service.get("user-1", "trip-1").await.unwrap().is_none());
        assert!(service
            .get_slot("user-1", "trip-1")
            .await
            .unwrap()
            .unwrap()
            .is_tombstone());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (service, clock) = test_service();
        service.put(test_trip("trip-1")).await.unwrap();

        let first = service
            .soft_delete("user-1", "trip-1", "user-1")
            .await
            .unwrap()
            .unwrap();
        clock.advance(5_000);
        let second = service
            .soft_delete("user-1", "trip-1", "user-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);

        // Deleting a record that never existed is a silent no-op
        assert!(service
            .soft_delete("user-1", "ghost", "user-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn trip_backup_is_zeroed_for_display() {
        let (service, _) = test_service();
        service.put(test_trip("trip-1")).await.unwrap();

        let tombstone = service
            .soft_delete("user-1", "trip-1", "user-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tombstone.backup.as_trip().unwrap().total_miles, 0.0);
        assert_eq!(tombstone.metadata.original_key, "trip:trip-1");
    }

    #[tokio::test]
    async fn restore_round_trips_the_backup() {
        let (service, clock) = test_service();
        let mut trip = Trip::new("trip-1", "user-1", "2024-03-01", 500);
        trip.total_earnings = 150.0;
        service.put(RecordPayload::Trip(trip)).await.unwrap();

        service.soft_delete("user-1", "trip-1", "user-1").await.unwrap();
        clock.advance(1_000);
        let restored = service.restore("user-1", "trip-1").await.unwrap();

        assert_eq!(restored.as_trip().unwrap().total_earnings, 150.0);
        assert_eq!(restored.updated_at(), 2_000);
        assert!(service.get("user-1", "trip-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn restore_errors_match_the_taxonomy() {
        let (service, _) = test_service();

        let err = service.restore("user-1", "ghost").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::RecordNotFound(_))
        ));

        service.put(test_trip("trip-1")).await.unwrap();
        let err = service.restore("user-1", "trip-1").await.unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::NotDeleted(_))));
    }

    #[tokio::test]
    async fn expired_tombstone_is_gone() {
        let (service, clock) = test_service();
        service.put(test_trip("trip-1")).await.unwrap();
        service.soft_delete("user-1", "trip-1", "user-1").await.unwrap();

        clock.advance(TRASH_RETENTION_MS);

        assert!(service.get_slot("user-1", "trip-1").await.unwrap().is_none());
        assert!(service.list_trash("user-1").await.unwrap().is_empty());
        let err = service.restore("user-1", "trip-1").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn plain_listing_excludes_tombstones() {
        let (service, _) = test_service();
        service.put(test_trip("trip-a")).await.unwrap();
        service.put(test_trip("trip-b")).await.unwrap();
        service.soft_delete("user-1", "trip-a", "user-1").await.unwrap();

        let listed = service.list("user-1", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), "trip-b");
    }

    #[tokio::test]
    async fn delta_listing_includes_tombstones() {
        let (service, clock) = test_service();
        service.put(test_trip("trip-a")).await.unwrap();
        clock.advance(1_000);
        service.put(test_trip("trip-b")).await.unwrap();
        clock.advance(1_000);
        service.soft_delete("user-1", "trip-a", "user-1").await.unwrap();

        // Everything after trip-a's original write: the update to trip-b
        // and trip-a's tombstone
        let delta = service.list("user-1", Some(1_000)).await.unwrap();
        assert_eq!(delta.len(), 2);
        assert!(delta.iter().any(|slot| slot.is_tombstone()));

        // Nothing after the tombstone
        assert!(service.list("user-1", Some(3_000)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trash_listing_is_newest_first() {
        let (service, clock) = test_service();
        for id in ["trip-a", "trip-b", "trip-c"] {
            service.put(test_trip(id)).await.unwrap();
        }
        service.soft_delete("user-1", "trip-b", "user-1").await.unwrap();
        clock.advance(1_000);
        service.soft_delete("user-1", "trip-a", "user-1").await.unwrap();

        let trash = service.list_trash("user-1").await.unwrap();
        let ids: Vec<_> = trash.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["trip-a", "trip-b"]);
        assert_eq!(trash[0].record_type, RecordType::Trip);
    }

    #[tokio::test]
    async fn missing_index_is_rebuilt_from_slots() {
        let clock = ManualClock::at(1_000);
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        let service = RecordService::new(RecordType::Trip, kv.clone(), clock.clone());

        service.put(test_trip("trip-a")).await.unwrap();
        service.put(test_trip("trip-b")).await.unwrap();

        // Simulate index loss; the next listing rebuilds it from the
        // authoritative slots
        kv.delete("idx:trip:user-1").await.unwrap();
        let listed = service.list("user-1", None).await.unwrap();
        assert_eq!(listed.len(), 2);

        let index = kv.get("idx:trip:user-1").await.unwrap().unwrap();
        let mut ids: Vec<String> = serde_json::from_value(index).unwrap();
        ids.sort();
        assert_eq!(ids, vec!["trip-a", "trip-b"]);
    }

    #[tokio::test]
    async fn stale_index_entries_are_pruned() {
        let clock = ManualClock::at(1_000);
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        let service = RecordService::new(RecordType::Trip, kv.clone(), clock.clone());

        service.put(test_trip("trip-a")).await.unwrap();
        service.put(test_trip("trip-b")).await.unwrap();

        // Remove a slot behind the index's back
        kv.delete("rec:trip:user-1:trip-a").await.unwrap();

        let listed = service.list("user-1", None).await.unwrap();
        assert_eq!(listed.len(), 1);

        let index = kv.get("idx:trip:user-1").await.unwrap().unwrap();
        let ids: Vec<String> = serde_json::from_value(index).unwrap();
        assert_eq!(ids, vec!["trip-b"]);
    }

    #[tokio::test]
    async fn corrupt_slot_is_skipped_in_listings() {
        let clock = ManualClock::at(1_000);
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        let service = RecordService::new(RecordType::Trip, kv.clone(), clock.clone());

        service.put(test_trip("trip-a")).await.unwrap();
        kv.put(
            "rec:trip:user-1:trip-bad",
            serde_json::json!({"garbage": true}),
            None,
        )
        .await
        .unwrap();
        kv.delete("idx:trip:user-1").await.unwrap();

        let listed = service.list("user-1", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), "trip-a");
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let (service, _) = test_service();
        service.put(test_trip("trip-1")).await.unwrap();

        let mut foreign = Trip::new("trip-1", "user-2", "2024-03-01", 500);
        foreign.total_miles = 7.0;
        service.put(RecordPayload::Trip(foreign)).await.unwrap();

        let mine = service.get("user-1", "trip-1").await.unwrap().unwrap();
        assert_eq!(mine.as_trip().unwrap().total_miles, 42.0);
        assert_eq!(service.list("user-2", None).await.unwrap().len(), 1);
    }
}
