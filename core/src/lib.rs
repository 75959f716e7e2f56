//! # Roadbook Core
//!
//! Domain model and lifecycle rules for an offline-first driving log.
//!
//! This crate holds the pure logic shared by the on-device sync client and
//! the cloud record service: the three record types (trips, expenses,
//! mileage logs), their derivation rules, the tombstone/trash
//! representation used for soft delete, the pending-mutation queue model,
//! and the cross-entity cascade rules.
//!
//! ## Design Principles
//!
//! - **No IO**: the crate has no knowledge of files, network, or platform
//! - **Deterministic**: derivations and cascades are pure state transitions
//! - **Testable**: every rule is callable without a store or a server
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! Data moves through the system as [`RecordPayload`], a tagged union over
//! [`Trip`], [`Expense`], and [`MileageLog`] keyed by `recordType`. Each
//! record carries a user-scoped id, millisecond timestamps, and a
//! [`SyncStatus`] reflecting its position in the sync pipeline.
//!
//! ### Tombstones
//!
//! Soft delete replaces a record in place with a [`Tombstone`] carrying a
//! full backup of the pre-delete payload and a 30-day expiry
//! ([`TRASH_RETENTION_SECS`]). A [`RecordSlot`] models the
//! active-or-tombstone state of one storage slot; restore reconstructs the
//! record from the backup.
//!
//! ### Pending mutations
//!
//! Offline edits are described by [`PendingMutation`] items (create,
//! update, delete, restore, permanent delete) drained in enqueue order.
//! Dispatch failures are classified by [`classify_status`] into fatal
//! (never retried) and transient (retried up to [`MAX_RETRIES`] times).
//!
//! ### Lifecycle rules
//!
//! The [`lifecycle`] module implements the cascade rules that span trips
//! and mileage logs: deleting a mileage log zeroes the linked trip's miles
//! and fuel cost, trip backups are stored with zeroed miles, and a mileage
//! log cannot be restored while its parent trip is deleted.

pub mod error;
pub mod expense;
pub mod lifecycle;
pub mod mileage;
pub mod queue;
pub mod record;
pub mod tombstone;
pub mod trip;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use expense::{Expense, ExpenseCategory};
pub use mileage::{MileageLog, ParentLink};
pub use queue::{classify_status, FailureKind, MutationAction, PendingMutation, MAX_RETRIES};
pub use record::{RecordPayload, RecordType, SyncStatus};
pub use tombstone::{
    RecordSlot, Tombstone, TombstoneMetadata, TrashSummary, TRASH_RETENTION_MS,
    TRASH_RETENTION_SECS,
};
pub use trip::{Trip, TripStop};

/// Type aliases for clarity
pub type RecordId = String;
pub type UserId = String;
pub type Timestamp = u64;

/// Round a value to two decimal places.
///
/// Single rounding point for miles and money amounts.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
