//! Collection-level request handlers: create, update, delete, list.
//!
//! These are plain async functions over [`AppState`] so tests can drive
//! them without an HTTP stack; the route layer only extracts request
//! parts and wraps responses.

use crate::error::{AppError, Result};
use crate::AppState;
use roadbook_core::{
    lifecycle, Error as DomainError, Expense, RecordPayload, RecordSlot, RecordType, Timestamp,
};
use serde_json::Value;

/// `POST /api/{collection}`: create a record. Generates an id when the
/// body carries none, scopes the record to the authenticated user, and
/// applies the per-type derivations. Mileage creates run the
/// linked-trip guard.
pub async fn create_record(
    state: &AppState,
    user_id: &str,
    kind: RecordType,
    mut body: Value,
) -> Result<RecordPayload> {
    ensure_id(&mut body);
    let mut payload = parse_payload(kind, body, user_id)?;
    payload.stamp_created(state.clock.now_ms());
    normalize(&mut payload);

    guard_mileage_write(state, user_id, &payload).await?;
    let stored = state.service(kind).put(payload).await?;
    if let RecordPayload::Expense(expense) = &stored {
        cascade_expense_rollup(state, user_id, None, Some(expense)).await?;
    }
    Ok(stored)
}

/// `PUT /api/{collection}/{id}`: update a record. 404 when the record
/// is absent or tombstoned; the stored creation timestamp survives the
/// update. Mileage updates run the linked-trip guard.
pub async fn update_record(
    state: &AppState,
    user_id: &str,
    kind: RecordType,
    id: &str,
    body: Value,
) -> Result<RecordPayload> {
    let existing = state
        .service(kind)
        .get(user_id, id)
        .await?
        .ok_or_else(|| AppError::Domain(DomainError::RecordNotFound(id.to_string())))?;

    let mut payload = parse_payload(kind, body, user_id)?;
    payload.set_id(id);
    preserve_created_at(&mut payload, &existing);
    normalize(&mut payload);

    guard_mileage_write(state, user_id, &payload).await?;
    let stored = state.service(kind).put(payload).await?;
    if kind == RecordType::Expense {
        cascade_expense_rollup(state, user_id, existing.as_expense(), stored.as_expense()).await?;
    }
    Ok(stored)
}

/// `DELETE /api/{collection}/{id}`: soft-delete. Idempotent, silent on
/// missing records. Deleting a mileage log zeroes the linked trip's
/// mileage-derived fields; deleting a rollup expense backs its amount
/// out of the linked trip; deleting a trip leaves its mileage log alone.
pub async fn delete_record(
    state: &AppState,
    user_id: &str,
    kind: RecordType,
    id: &str,
) -> Result<()> {
    if kind == RecordType::Mileage {
        cascade_mileage_delete(state, user_id, id).await?;
    }
    if kind == RecordType::Expense {
        if let Some(RecordPayload::Expense(expense)) = state.expenses().get(user_id, id).await? {
            cascade_expense_rollup(state, user_id, Some(&expense), None).await?;
        }
    }
    state.service(kind).soft_delete(user_id, id, user_id).await?;
    Ok(())
}

/// `GET /api/{collection}[?since=]`: full or delta listing.
pub async fn list_records(
    state: &AppState,
    user_id: &str,
    kind: RecordType,
    since: Option<Timestamp>,
) -> Result<Vec<RecordSlot>> {
    state.service(kind).list(user_id, since).await
}

/// Rule 1: a mileage delete clears the linked trip's `totalMiles` and
/// `fuelCost` and flags it pending for re-propagation. The trip itself
/// is not deleted.
async fn cascade_mileage_delete(state: &AppState, user_id: &str, id: &str) -> Result<()> {
    let Some(RecordSlot::Active(RecordPayload::Mileage(log))) =
        state.mileage().get_slot(user_id, id).await?
    else {
        return Ok(());
    };

    let trip_id = log.parent_trip().trip_id().clone();
    let Some(RecordPayload::Trip(mut trip)) = state.trips().get(user_id, &trip_id).await? else {
        return Ok(());
    };

    lifecycle::zero_trip_mileage(&mut trip, state.clock.now_ms());
    tracing::debug!(user_id, mileage = id, trip = %trip_id, "zeroed trip mileage after log delete");
    state.trips().put(RecordPayload::Trip(trip)).await?;
    Ok(())
}

/// Trip-linked fuel, maintenance, and supplies expenses roll up into the
/// linked trip's cost fields. `before`/`after` bracket the expense write;
/// a re-linked expense adjusts both the old and the new trip.
pub(super) async fn cascade_expense_rollup(
    state: &AppState,
    user_id: &str,
    before: Option<&Expense>,
    after: Option<&Expense>,
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
        let Some(RecordPayload::Trip(mut trip)) = state.trips().get(user_id, &trip_id).await?
        else {
            continue;
        };
        if lifecycle::apply_expense_rollup(&mut trip, before, after, state.clock.now_ms()) {
            tracing::debug!(user_id, trip = %trip_id, "reapplied expense rollup");
            state.trips().put(RecordPayload::Trip(trip)).await?;
        }
    }
    Ok(())
}

/// Rule 5: reject mileage writes attached to a missing or tombstoned
/// trip with a conflict. Enforced here only; direct service calls
/// bypass it.
async fn guard_mileage_write(
    state: &AppState,
    user_id: &str,
    payload: &RecordPayload,
) -> Result<()> {
    let RecordPayload::Mileage(log) = payload else {
        return Ok(());
    };
    let link = log.parent_trip();
    let parent = state.trips().get_slot(user_id, link.trip_id()).await?;
    lifecycle::check_mileage_write(&link, parent.as_ref())?;
    Ok(())
}

/// Parse a request body into a typed record, tolerating bodies that
/// omit the `recordType` tag (the path already names the collection).
fn parse_payload(kind: RecordType, mut body: Value, user_id: &str) -> Result<RecordPayload> {
    if let Some(object) = body.as_object_mut() {
        object
            .entry("recordType")
            .or_insert_with(|| Value::String(kind.as_str().to_string()));
    }
    let mut payload: RecordPayload = serde_json::from_value(body)
        .map_err(|err| AppError::Domain(DomainError::InvalidPayload(err.to_string())))?;
    if payload.record_type() != kind {
        return Err(AppError::Domain(DomainError::TypeMismatch {
            expected: kind,
            got: payload.record_type(),
        }));
    }
    payload.set_user_id(user_id);
    Ok(payload)
}

/// Fill a missing or empty id with a fresh UUID.
fn ensure_id(body: &mut Value) {
    let Some(object) = body.as_object_mut() else {
        return;
    };
    let missing = match object.get("id") {
        None | Some(Value::Null) => true,
        Some(Value::String(id)) => id.is_empty(),
        Some(_) => false,
    };
    if missing {
        object.insert(
            "id".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
}

fn preserve_created_at(payload: &mut RecordPayload, existing: &RecordPayload) {
    let created_at = existing.created_at();
    match payload {
        RecordPayload::Trip(trip) => trip.created_at = created_at,
        RecordPayload::Expense(expense) => expense.created_at = created_at,
        RecordPayload::Mileage(log) => log.created_at = created_at,
    }
}

fn normalize(payload: &mut RecordPayload) {
    match payload {
        RecordPayload::Trip(trip) => trip.recompute_net_profit(),
        RecordPayload::Mileage(log) => log.normalize(),
        RecordPayload::Expense(_) => {}
    }
}
