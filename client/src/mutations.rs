//! Optimistic mutation facade and delta pull.
//!
//! Each user mutation is applied to the local store first, appended to
//! the pending queue, and a debounced drain is requested. The local
//! apply mirrors the server's lifecycle rules so the UI reads consistent
//! state before the server confirms: a local mileage delete zeroes the
//! linked trip for display, and a local mileage restore is refused while
//! the parent trip is absent. The server's cascade remains authoritative
//! and re-propagates through delta pulls.

use crate::engine::SyncEngine;
use crate::error::{ClientError, Result};
use crate::now_ms;
use roadbook_core::{
    lifecycle, Error as DomainError, Expense, MutationAction, RecordPayload, RecordSlot,
    RecordType, SyncStatus, Timestamp, Tombstone, UserId,
};

impl SyncEngine {
    /// Apply a create locally and queue it for transmission. Records
    /// created without an id get one minted here, so the optimistic
    /// local copy and the transmitted create agree.
    pub fn create_record(&self, mut payload: RecordPayload) -> Result<RecordPayload> {
        let now = now_ms();
        if payload.id().is_empty() {
            payload.set_id(uuid::Uuid::new_v4().to_string());
        }
        payload.stamp_created(now);
        normalize(&mut payload);
        payload.set_sync_status(SyncStatus::Pending);

        self.store().put_record(&payload)?;
        if let RecordPayload::Expense(expense) = &payload {
            self.mirror_expense_rollup(None, Some(expense), now)?;
        }
        self.enqueue_and_poke(
            MutationAction::Create,
            payload.record_type(),
            payload.id().clone(),
            Some(&payload),
            now,
        )?;
        Ok(payload)
    }

    /// Apply a user edit locally and queue it for transmission.
    pub fn update_record(&self, mut payload: RecordPayload) -> Result<RecordPayload> {
        let now = now_ms();
        let previous = self
            .store()
            .get_record(payload.record_type(), payload.id())?;
        mark_edited(&mut payload, now);
        normalize(&mut payload);

        self.store().put_record(&payload)?;
        if let RecordPayload::Expense(expense) = &payload {
            let before = previous.as_ref().and_then(|p| p.as_expense());
            self.mirror_expense_rollup(before, Some(expense), now)?;
        }
        self.enqueue_and_poke(
            MutationAction::Update,
            payload.record_type(),
            payload.id().clone(),
            Some(&payload),
            now,
        )?;
        Ok(payload)
    }

    /// Soft-delete a record locally (move it to trash) and queue the
    /// delete. Deleting a mileage log zeroes its linked trip's mileage
    /// fields locally; deleting a rollup expense backs its amount out of
    /// the linked trip. Both match the server cascade; the trip itself
    /// is not deleted and no trip mutation is queued, since the server
    /// owns the authoritative cascade. Missing records are a no-op.
    pub fn delete_record(&self, record_type: RecordType, id: &str) -> Result<()> {
        let now = now_ms();
        let Some(record) = self.store().get_record(record_type, id)? else {
            return Ok(());
        };
        let user_id = record.user_id().clone();

        if let RecordPayload::Mileage(log) = &record {
            let trip_id = log.parent_trip().trip_id().clone();
            if let Some(RecordPayload::Trip(mut trip)) =
                self.store().get_record(RecordType::Trip, &trip_id)?
            {
                lifecycle::zero_trip_mileage(&mut trip, now);
                self.store().put_record(&RecordPayload::Trip(trip))?;
            }
        }
        if let RecordPayload::Expense(expense) = &record {
            self.mirror_expense_rollup(Some(expense), None, now)?;
        }

        let backup = lifecycle::backup_for_delete(record);
        self.store()
            .put_trash(&Tombstone::new(backup, user_id, now))?;
        self.store().delete_record(record_type, id)?;
        self.enqueue_and_poke(MutationAction::Delete, record_type, id.to_string(), None, now)?;
        Ok(())
    }

    /// Restore a record from the local trash and queue the restore.
    ///
    /// A mileage restore is refused while its parent trip is absent or
    /// still in the trash; a successful one pushes the restored miles
    /// back into the parent trip locally.
    pub fn restore_record(&self, record_type: RecordType, id: &str) -> Result<RecordPayload> {
        let now = now_ms();
        let tombstone = self
            .store()
            .get_trash(record_type, id)?
            .ok_or_else(|| ClientError::NotFound(id.to_string()))?;

        let mut payload = tombstone.backup.clone();

        if let RecordPayload::Mileage(log) = &payload {
            let trip_id = log.parent_trip().trip_id().clone();
            let parent = self.store().get_record(RecordType::Trip, &trip_id)?;
            let parent_trip = parent.as_ref().and_then(|p| p.as_trip());
            lifecycle::ensure_parent_active(parent_trip)
                .map_err(|_| ClientError::Domain(DomainError::ParentTripDeleted))?;

            if let Some(mut trip) = parent_trip.cloned() {
                lifecycle::apply_restored_mileage(&mut trip, log, now);
                self.store().put_record(&RecordPayload::Trip(trip))?;
            }
        }

        payload.touch(now);
        payload.set_sync_status(SyncStatus::Pending);
        self.store().put_record(&payload)?;
        if let RecordPayload::Expense(expense) = &payload {
            self.mirror_expense_rollup(None, Some(expense), now)?;
        }
        self.store().delete_trash(record_type, id)?;
        self.enqueue_and_poke(MutationAction::Restore, record_type, id.to_string(), None, now)?;
        Ok(payload)
    }

    /// Purge a record from the local trash, bypassing retention, and
    /// queue the permanent delete.
    pub fn purge_record(&self, record_type: RecordType, id: &str) -> Result<()> {
        let now = now_ms();
        self.store().delete_trash(record_type, id)?;
        self.enqueue_and_poke(
            MutationAction::PermanentDelete,
            record_type,
            id.to_string(),
            None,
            now,
        )?;
        Ok(())
    }

    /// Pull server-side changes for one record type since the stored
    /// watermark and apply them locally. Tombstones become local deletes
    /// plus trash copies so deletions propagate across devices; active
    /// records apply last-write-wins against locally pending edits.
    /// Returns the number of slots applied.
    pub async fn pull(&self, record_type: RecordType, user_id: &UserId) -> Result<usize> {
        let since = self.store().cursor(record_type)?;
        let slots = self.api().list_since(record_type, since).await?;

        let mut watermark = since.unwrap_or(0);
        let mut applied = 0;
        for slot in slots {
            if slot.user_id() != user_id {
                continue;
            }
            watermark = watermark.max(slot.watermark());
            match slot {
                RecordSlot::Tombstone(tombstone) => {
                    self.store().delete_record(record_type, &tombstone.id)?;
                    self.store().put_trash(&tombstone)?;
                    applied += 1;
                }
                RecordSlot::Active(mut incoming) => {
                    if let Some(local) = self.store().get_record(record_type, incoming.id())? {
                        if local.sync_status() == SyncStatus::Pending
                            && conflict_stamp(&local) >= incoming.updated_at()
                        {
                            // Local pending edit wins for now; the queued
                            // mutation will overwrite the server copy.
                            continue;
                        }
                    }
                    incoming.set_sync_status(SyncStatus::Synced);
                    self.store().put_record(&incoming)?;
                    applied += 1;
                }
            }
        }

        if watermark > since.unwrap_or(0) {
            self.store().set_cursor(record_type, watermark)?;
        }
        Ok(applied)
    }

    /// Local mirror of the server's expense rollup: fuel, maintenance,
    /// and supplies expenses linked to a trip adjust the trip's cost
    /// fields as they change, so totals read consistently before the
    /// server confirms.
    fn mirror_expense_rollup(
        &self,
        before: Option<&Expense>,
        after: Option<&Expense>,
        now: Timestamp,
    ) -> Result<()> {
        let mut trip_ids = Vec::new();
        for expense in [before, after].into_iter().flatten() {
            if let Some(trip_id) = expense.linked_trip_id() {
                if !trip_ids.contains(&trip_id) {
                    trip_ids.push(trip_id);
                }
            }
        }
        for trip_id in trip_ids {
            if let Some(RecordPayload::Trip(mut trip)) =
                self.store().get_record(RecordType::Trip, &trip_id)?
            {
                if lifecycle::apply_expense_rollup(&mut trip, before, after, now) {
                    self.store().put_record(&RecordPayload::Trip(trip))?;
                }
            }
        }
        Ok(())
    }

    fn enqueue_and_poke(
        &self,
        action: MutationAction,
        record_type: RecordType,
        target_id: String,
        payload: Option<&RecordPayload>,
        timestamp: Timestamp,
    ) -> Result<()> {
        let body = match payload {
            Some(record) => Some(serde_json::to_value(record)?),
            None => None,
        };
        self.queue()
            .enqueue(action, record_type, &target_id, body.as_ref(), timestamp)?;
        self.request_drain();
        Ok(())
    }
}

/// Run the per-type derivations after a local write.
fn normalize(payload: &mut RecordPayload) {
    match payload {
        RecordPayload::Trip(trip) => trip.recompute_net_profit(),
        RecordPayload::Mileage(log) => log.normalize(),
        RecordPayload::Expense(_) => {}
    }
}

/// Stamp a user-initiated edit on any record type.
fn mark_edited(payload: &mut RecordPayload, now: Timestamp) {
    match payload {
        RecordPayload::Trip(trip) => trip.mark_edited(now),
        _ => {
            payload.touch(now);
            payload.set_sync_status(SyncStatus::Pending);
        }
    }
}

/// Timestamp used for last-write-wins comparison: `lastModified` for
/// trips (user edits only), `updatedAt` otherwise.
fn conflict_stamp(payload: &RecordPayload) -> Timestamp {
    match payload {
        RecordPayload::Trip(trip) => trip.last_modified,
        other => other.updated_at(),
    }
}
