//! Cross-entity rules applied when trips and mileage logs are deleted or
//! restored.
//!
//! Trips and mileage logs are linked (explicitly via `tripId`, or by the
//! legacy same-id convention) but are deleted and restored independently.
//! The functions here keep the pair consistent across those operations:
//!
//! - deleting a mileage log zeroes the linked trip's mileage-derived
//!   fields, without deleting the trip
//! - a deleted trip is backed up with zero miles, and its mileage log is
//!   left alone
//! - restoring a trip never resurrects its mileage log
//! - restoring a mileage log requires an active parent trip, and pushes
//!   the restored miles back into the trip's totals
//! - fuel, maintenance, and supplies expenses attached to a trip roll
//!   up into the trip's matching cost field as they change
//!
//! All functions are pure over their inputs. Callers (the request
//! handlers composing the per-entity record services) perform the reads
//! and writes around them.

use crate::{
    round2, Error, Expense, ExpenseCategory, MileageLog, ParentLink, RecordPayload, RecordSlot,
    Result, SyncStatus, Timestamp, Trip,
};

/// Prepare a record for tombstoning.
///
/// A trip's backup is stored with `totalMiles` zeroed so a later restore
/// shows no mileage until the mileage log itself is restored. Other
/// record types are backed up unchanged.
pub fn backup_for_delete(payload: RecordPayload) -> RecordPayload {
    match payload {
        RecordPayload::Trip(mut trip) => {
            trip.total_miles = 0.0;
            RecordPayload::Trip(trip)
        }
        other => other,
    }
}

/// Clear a trip's mileage-derived fields after its mileage log is deleted.
///
/// Zeroes `totalMiles` and `fuelCost`, recomputes net profit, and flags
/// the trip pending so the change propagates on the next sync.
pub fn zero_trip_mileage(trip: &mut Trip, now: Timestamp) {
    trip.total_miles = 0.0;
    trip.fuel_cost = 0.0;
    trip.recompute_net_profit();
    trip.sync_status = SyncStatus::Pending;
    trip.touch(now);
}

/// Gate a mileage restore on its parent trip being present and active.
pub fn ensure_parent_active(parent: Option<&Trip>) -> Result<()> {
    match parent {
        Some(_) => Ok(()),
        None => Err(Error::ParentTripDeleted),
    }
}

/// Push a restored mileage log's miles back into its parent trip.
///
/// Sets `totalMiles` from the log and recomputes `fuelCost` from the
/// trip's stored mpg and gas price when both are available. The trip is
/// flagged pending for re-propagation.
pub fn apply_restored_mileage(trip: &mut Trip, log: &MileageLog, now: Timestamp) {
    trip.total_miles = log.miles;
    if let Some(cost) = trip.fuel_cost_for_miles(log.miles) {
        trip.fuel_cost = cost;
    }
    trip.recompute_net_profit();
    trip.sync_status = SyncStatus::Pending;
    trip.touch(now);
}

/// Adjust a trip's cost fields as a linked rollup expense changes.
///
/// `before` is the expense as previously stored and `after` the incoming
/// one; either side may be absent (create, delete, restore). Only fuel,
/// maintenance, and supplies expenses linked to this trip participate;
/// anything else leaves the trip untouched. Returns whether the trip
/// changed and needs rewriting.
pub fn apply_expense_rollup(
    trip: &mut Trip,
    before: Option<&Expense>,
    after: Option<&Expense>,
    now: Timestamp,
) -> bool {
    let mut changed = false;
    if let Some(expense) = before {
        if expense.linked_trip_id().as_deref() == Some(trip.id.as_str()) {
            if let Some(field) = rollup_field(trip, expense.category) {
                *field = round2((*field - expense.amount).max(0.0));
                changed = true;
            }
        }
    }
    if let Some(expense) = after {
        if expense.linked_trip_id().as_deref() == Some(trip.id.as_str()) {
            if let Some(field) = rollup_field(trip, expense.category) {
                *field = round2(*field + expense.amount);
                changed = true;
            }
        }
    }
    if changed {
        trip.recompute_net_profit();
        trip.sync_status = SyncStatus::Pending;
        trip.touch(now);
    }
    changed
}

/// The trip cost field a rollup category feeds, `None` for categories
/// that stay out of trip totals.
fn rollup_field(trip: &mut Trip, category: ExpenseCategory) -> Option<&mut f64> {
    if !category.rolls_up() {
        return None;
    }
    Some(match category {
        ExpenseCategory::Fuel => &mut trip.fuel_cost,
        ExpenseCategory::Maintenance => &mut trip.maintenance_cost,
        _ => &mut trip.supplies_cost,
    })
}

/// Reject mileage writes that would attach to a missing or deleted trip.
///
/// An explicit `tripId` must point at an active trip. A legacy same-id
/// link only conflicts when the same-id trip is tombstoned; a log whose
/// id matches no trip at all is allowed to stand alone.
///
/// `parent` is the raw storage slot for the resolved trip id, `None`
/// when no slot exists.
pub fn check_mileage_write(link: &ParentLink, parent: Option<&RecordSlot>) -> Result<()> {
    match link {
        ParentLink::Explicit(trip_id) => match parent {
            Some(RecordSlot::Active(_)) => Ok(()),
            _ => Err(Error::TripConflict(trip_id.clone())),
        },
        ParentLink::Legacy(trip_id) => match parent {
            Some(RecordSlot::Tombstone(_)) => Err(Error::TripConflict(trip_id.clone())),
            _ => Ok(()),
        },
    }
}
