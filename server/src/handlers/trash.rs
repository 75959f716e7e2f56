//! Trash request handlers: listing, restore, permanent delete.
//!
//! Restore composes the trip and mileage services to enforce the
//! restore-side lifecycle rules: restoring a trip never resurrects its
//! mileage log, and restoring a mileage log is refused while its parent
//! trip is not active.

use crate::error::{AppError, Result};
use crate::AppState;
use roadbook_core::{
    lifecycle, Error as DomainError, RecordPayload, RecordSlot, RecordType, TrashSummary,
};

/// `GET /api/trash`: a user's tombstones across all three entity types,
/// most recently deleted first.
pub async fn list_trash(state: &AppState, user_id: &str) -> Result<Vec<TrashSummary>> {
    let mut summaries = Vec::new();
    for kind in RecordType::all() {
        summaries.extend(state.service(kind).list_trash(user_id).await?);
    }
    summaries.sort_by_key(|summary| std::cmp::Reverse(summary.deleted_at));
    Ok(summaries)
}

/// `POST /api/trash/{id}[?type=]`: restore a record from the trash.
///
/// Without an explicit type the services are probed in a fixed order
/// (trip, expense, mileage). 404 when no tombstone matches.
pub async fn restore_record(
    state: &AppState,
    user_id: &str,
    id: &str,
    kind: Option<RecordType>,
) -> Result<RecordPayload> {
    let kinds: Vec<RecordType> = match kind {
        Some(kind) => vec![kind],
        None => RecordType::all().to_vec(),
    };

    for kind in kinds {
        let slot = state.service(kind).get_slot(user_id, id).await?;
        if matches!(slot, Some(RecordSlot::Tombstone(_))) {
            return restore_tombstoned(state, user_id, kind, id).await;
        }
    }
    Err(AppError::Domain(DomainError::RecordNotFound(id.to_string())))
}

/// `DELETE /api/trash/{id}?type=`: remove a tombstone unconditionally,
/// bypassing the retention window. Idempotent.
pub async fn purge_record(
    state: &AppState,
    user_id: &str,
    id: &str,
    kind: RecordType,
) -> Result<()> {
    state.service(kind).permanent_delete(user_id, id).await
}

async fn restore_tombstoned(
    state: &AppState,
    user_id: &str,
    kind: RecordType,
    id: &str,
) -> Result<RecordPayload> {
    if kind != RecordType::Mileage {
        // Rule 3: a trip restore reactivates only the trip; any mileage
        // tombstone stays in the trash until restored explicitly.
        let restored = state.service(kind).restore(user_id, id).await?;
        if let RecordPayload::Expense(expense) = &restored {
            super::records::cascade_expense_rollup(state, user_id, None, Some(expense)).await?;
        }
        return Ok(restored);
    }

    // Rule 4: a mileage restore needs an active parent trip, and pushes
    // the restored miles back into the trip's totals.
    let Some(RecordSlot::Tombstone(tombstone)) = state.mileage().get_slot(user_id, id).await?
    else {
        return Err(AppError::Domain(DomainError::RecordNotFound(id.to_string())));
    };
    let log = tombstone
        .backup
        .as_mileage()
        .ok_or_else(|| AppError::Domain(DomainError::InvalidPayload("not a mileage backup".into())))?;

    let trip_id = log.parent_trip().trip_id().clone();
    let parent = state.trips().get(user_id, &trip_id).await?;
    let parent_trip = parent.and_then(RecordPayload::into_trip);
    lifecycle::ensure_parent_active(parent_trip.as_ref())?;

    let restored = state.mileage().restore(user_id, id).await?;
    if let (Some(mut trip), Some(log)) = (parent_trip, restored.as_mileage()) {
        lifecycle::apply_restored_mileage(&mut trip, log, state.clock.now_ms());
        state.trips().put(RecordPayload::Trip(trip)).await?;
    }
    Ok(restored)
}
