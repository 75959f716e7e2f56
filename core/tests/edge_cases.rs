//! Edge case tests for roadbook-core
//!
//! These tests cover boundary conditions and unusual inputs.

use roadbook_core::{
    lifecycle, Expense, ExpenseCategory, MileageLog, ParentLink, RecordPayload, RecordSlot,
    RecordType, SyncStatus, Tombstone, Trip, TripStop, TRASH_RETENTION_MS,
};

fn test_trip(id: &str) -> Trip {
    Trip::new(id, "user-1", "2024-03-01", 1000)
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn unicode_addresses_survive_roundtrip() {
    let addresses = vec![
        "日本橋1丁目",
        "Калинина 12",
        "شارع النيل",
        "🏠 Home",
        "123 Main St\nApt 4",
    ];

    for (i, address) in addresses.iter().enumerate() {
        let mut trip = test_trip(&format!("trip-{}", i));
        trip.start_address = Some(address.to_string());
        trip.stops.push(TripStop {
            address: address.to_string(),
            earnings: 5.0,
            order: 0,
        });

        let json = serde_json::to_string(&trip).unwrap();
        let parsed: Trip = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.start_address.as_deref(), Some(*address));
        assert_eq!(parsed.stops[0].address, *address);
    }
}

#[test]
fn empty_expense_description() {
    let expense = Expense::new("e-1", "user-1", "2024-03-01", ExpenseCategory::Fuel, 12.5, 1000);
    assert_eq!(expense.description, "");

    let json = serde_json::to_string(&expense).unwrap();
    let parsed: Expense = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.description, "");
}

#[test]
fn expense_id_with_many_separators() {
    let mut expense = Expense::new(
        "trip-1:fuel:morning",
        "user-1",
        "2024-03-01",
        ExpenseCategory::Fuel,
        10.0,
        1000,
    );
    // Only the first separator splits the legacy prefix
    assert_eq!(expense.linked_trip_id().as_deref(), Some("trip-1"));

    expense.id = ":dangling".to_string();
    assert_eq!(expense.linked_trip_id(), None);
}

// ============================================================================
// Numeric Edge Cases
// ============================================================================

#[test]
fn identical_odometer_readings_give_zero_miles() {
    let log = MileageLog::new("m-1", "user-1", "2024-03-01", 4321.7, 4321.7, 1000);
    assert_eq!(log.miles, 0.0);
    assert_eq!(log.reimbursement, None);
}

#[test]
fn reversed_odometer_readings_clamp_to_zero() {
    let log = MileageLog::new("m-1", "user-1", "2024-03-01", 900.0, 100.0, 1000);
    assert_eq!(log.miles, 0.0);
}

#[test]
fn large_odometer_readings() {
    let log = MileageLog::new("m-1", "user-1", "2024-03-01", 999_000.25, 999_123.75, 1000);
    assert_eq!(log.miles, 123.5);
}

#[test]
fn net_profit_can_go_negative() {
    let mut trip = test_trip("trip-1");
    trip.total_earnings = 10.0;
    trip.fuel_cost = 25.0;
    trip.recompute_net_profit();
    assert_eq!(trip.net_profit, -15.0);
}

#[test]
fn fuel_cost_with_zero_mpg_is_unavailable() {
    let mut trip = test_trip("trip-1");
    trip.vehicle_mpg = Some(0.0);
    trip.gas_price = Some(3.5);
    assert_eq!(trip.fuel_cost_for_miles(100.0), None);
}

#[test]
fn zero_mile_restore_zeroes_trip_totals() {
    let mut trip = test_trip("trip-1");
    trip.total_miles = 88.0;
    trip.fuel_cost = 9.0;
    trip.vehicle_mpg = Some(30.0);
    trip.gas_price = Some(3.0);

    let log = MileageLog::new("m-1", "user-1", "2024-03-01", 100.0, 100.0, 1000);
    lifecycle::apply_restored_mileage(&mut trip, &log, 2000);
    assert_eq!(trip.total_miles, 0.0);
    assert_eq!(trip.fuel_cost, 0.0);
}

// ============================================================================
// Tombstone Edge Cases
// ============================================================================

#[test]
fn expiry_boundary_is_inclusive() {
    let tombstone = Tombstone::new(RecordPayload::Trip(test_trip("trip-1")), "user-1", 0);
    assert!(!tombstone.is_expired(TRASH_RETENTION_MS - 1));
    assert!(tombstone.is_expired(TRASH_RETENTION_MS));
    assert!(tombstone.is_expired(TRASH_RETENTION_MS + 1));
}

#[test]
fn tombstone_of_restored_backup_keeps_original_payload() {
    let mut trip = test_trip("trip-1");
    trip.total_earnings = 42.5;
    let first = Tombstone::new(
        lifecycle::backup_for_delete(RecordPayload::Trip(trip)),
        "user-1",
        1000,
    );

    // Re-deleting after a restore reuses the restored payload as backup
    let second = Tombstone::new(first.backup.clone(), "user-1", 2000);
    assert_eq!(second.backup.as_trip().unwrap().total_earnings, 42.5);
    assert_eq!(second.deleted_at, 2000);
    assert_eq!(second.metadata.original_key, "trip:trip-1");
}

#[test]
fn slot_rejects_garbage_shapes() {
    let garbage = [
        r#"{"foo": "bar"}"#,
        r#"{"recordType": "spaceship", "id": "x"}"#,
        r#"[1, 2, 3]"#,
        r#""just a string""#,
    ];
    for json in garbage {
        assert!(serde_json::from_str::<RecordSlot>(json).is_err());
    }
}

#[test]
fn slot_parse_tolerates_unknown_fields() {
    let mut trip = test_trip("trip-1");
    trip.sync_status = SyncStatus::Synced;
    let mut value = serde_json::to_value(RecordPayload::Trip(trip)).unwrap();
    value["legacyField"] = serde_json::json!("kept by older clients");

    let slot: RecordSlot = serde_json::from_value(value).unwrap();
    assert_eq!(slot.id(), "trip-1");
    assert!(!slot.is_tombstone());
}

#[test]
fn trash_summaries_distinguish_same_id_across_types() {
    let trip = Tombstone::new(RecordPayload::Trip(test_trip("shared-id")), "user-1", 1000);
    let log = MileageLog::new("shared-id", "user-1", "2024-03-01", 0.0, 10.0, 1000);
    let mileage = Tombstone::new(RecordPayload::Mileage(log), "user-1", 1000);

    assert_ne!(trip.trash_key(), mileage.trash_key());
    assert_eq!(trip.summary().record_type, RecordType::Trip);
    assert_eq!(mileage.summary().record_type, RecordType::Mileage);
}

// ============================================================================
// Lifecycle Edge Cases
// ============================================================================

#[test]
fn mileage_guard_uses_explicit_link_over_legacy() {
    let mut log = MileageLog::new("trip-1", "user-1", "2024-03-01", 0.0, 10.0, 1000);
    log.trip_id = Some("trip-2".to_string());

    // The same-id trip being tombstoned is irrelevant once tripId is explicit
    assert_eq!(log.parent_trip(), ParentLink::Explicit("trip-2".to_string()));

    let active = RecordSlot::Active(RecordPayload::Trip(test_trip("trip-2")));
    assert!(lifecycle::check_mileage_write(&log.parent_trip(), Some(&active)).is_ok());
}

#[test]
fn backup_zeroing_does_not_touch_other_fields() {
    let mut trip = test_trip("trip-1");
    trip.total_miles = 120.0;
    trip.fuel_cost = 14.0;
    trip.total_earnings = 300.0;
    trip.end_address = Some("Airport".to_string());

    let backup = lifecycle::backup_for_delete(RecordPayload::Trip(trip));
    let trip = backup.as_trip().unwrap();
    assert_eq!(trip.total_miles, 0.0);
    assert_eq!(trip.fuel_cost, 14.0);
    assert_eq!(trip.total_earnings, 300.0);
    assert_eq!(trip.end_address.as_deref(), Some("Airport"));
}
