//! Record envelope types shared by all three entities.
//!
//! The sync pipeline moves records around as a tagged union so that queue
//! items, tombstone backups, and wire payloads all carry their own type.

use crate::{Expense, MileageLog, RecordId, Timestamp, Trip, UserId};
use serde::{Deserialize, Serialize};

/// The three record types the system synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Trip,
    Expense,
    Mileage,
}

impl RecordType {
    /// Collection name used in API paths and storage key namespaces.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Trip => "trip",
            RecordType::Expense => "expense",
            RecordType::Mileage => "mileage",
        }
    }

    /// Parse a collection name; `None` for anything unknown.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "trip" => Some(RecordType::Trip),
            "expense" => Some(RecordType::Expense),
            "mileage" => Some(RecordType::Mileage),
            _ => None,
        }
    }

    /// All record types, in the order restore probing uses.
    pub fn all() -> [RecordType; 3] {
        [RecordType::Trip, RecordType::Expense, RecordType::Mileage]
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record sits in the sync pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Acknowledged by the server
    Synced,
    /// Local edit awaiting transmission
    #[default]
    Pending,
    /// Currently in flight
    Syncing,
    /// Last transmission failed fatally
    Error,
}

/// A record of any type, tagged by `recordType` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "recordType", rename_all = "lowercase")]
pub enum RecordPayload {
    Trip(Trip),
    Expense(Expense),
    Mileage(MileageLog),
}

impl RecordPayload {
    /// Get the record type tag.
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordPayload::Trip(_) => RecordType::Trip,
            RecordPayload::Expense(_) => RecordType::Expense,
            RecordPayload::Mileage(_) => RecordType::Mileage,
        }
    }

    /// Get the record id.
    pub fn id(&self) -> &RecordId {
        match self {
            RecordPayload::Trip(t) => &t.id,
            RecordPayload::Expense(e) => &e.id,
            RecordPayload::Mileage(m) => &m.id,
        }
    }

    /// Get the owning user id.
    pub fn user_id(&self) -> &UserId {
        match self {
            RecordPayload::Trip(t) => &t.user_id,
            RecordPayload::Expense(e) => &e.user_id,
            RecordPayload::Mileage(m) => &m.user_id,
        }
    }

    /// Get the last-updated timestamp.
    pub fn updated_at(&self) -> Timestamp {
        match self {
            RecordPayload::Trip(t) => t.updated_at,
            RecordPayload::Expense(e) => e.updated_at,
            RecordPayload::Mileage(m) => m.updated_at,
        }
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> Timestamp {
        match self {
            RecordPayload::Trip(t) => t.created_at,
            RecordPayload::Expense(e) => e.created_at,
            RecordPayload::Mileage(m) => m.created_at,
        }
    }

    /// Get the sync status.
    pub fn sync_status(&self) -> SyncStatus {
        match self {
            RecordPayload::Trip(t) => t.sync_status,
            RecordPayload::Expense(e) => e.sync_status,
            RecordPayload::Mileage(m) => m.sync_status,
        }
    }

    /// Overwrite the record id.
    pub fn set_id(&mut self, id: impl Into<RecordId>) {
        let id = id.into();
        match self {
            RecordPayload::Trip(t) => t.id = id,
            RecordPayload::Expense(e) => e.id = id,
            RecordPayload::Mileage(m) => m.id = id,
        }
    }

    /// Overwrite the owning user id.
    pub fn set_user_id(&mut self, user_id: impl Into<UserId>) {
        let user_id = user_id.into();
        match self {
            RecordPayload::Trip(t) => t.user_id = user_id,
            RecordPayload::Expense(e) => e.user_id = user_id,
            RecordPayload::Mileage(m) => m.user_id = user_id,
        }
    }

    /// Stamp creation metadata on a record that has none yet.
    pub fn stamp_created(&mut self, now: Timestamp) {
        match self {
            RecordPayload::Trip(t) => {
                if t.created_at == 0 {
                    t.created_at = now;
                }
                if t.last_modified == 0 {
                    t.last_modified = now;
                }
            }
            RecordPayload::Expense(e) => {
                if e.created_at == 0 {
                    e.created_at = now;
                }
            }
            RecordPayload::Mileage(m) => {
                if m.created_at == 0 {
                    m.created_at = now;
                }
            }
        }
        self.touch(now);
    }

    /// Bump the last-updated timestamp (system update, not a user edit).
    pub fn touch(&mut self, now: Timestamp) {
        match self {
            RecordPayload::Trip(t) => t.updated_at = now,
            RecordPayload::Expense(e) => e.updated_at = now,
            RecordPayload::Mileage(m) => m.updated_at = now,
        }
    }

    /// Mark the record acknowledged by the server.
    pub fn mark_synced(&mut self, now: Timestamp) {
        match self {
            RecordPayload::Trip(t) => {
                t.sync_status = SyncStatus::Synced;
                t.last_synced_at = Some(now);
            }
            RecordPayload::Expense(e) => {
                e.sync_status = SyncStatus::Synced;
                e.last_synced_at = Some(now);
            }
            RecordPayload::Mileage(m) => {
                m.sync_status = SyncStatus::Synced;
                m.last_synced_at = Some(now);
            }
        }
    }

    /// Set the sync status.
    pub fn set_sync_status(&mut self, status: SyncStatus) {
        match self {
            RecordPayload::Trip(t) => t.sync_status = status,
            RecordPayload::Expense(e) => e.sync_status = status,
            RecordPayload::Mileage(m) => m.sync_status = status,
        }
    }

    /// The trip, when this payload holds one.
    pub fn as_trip(&self) -> Option<&Trip> {
        match self {
            RecordPayload::Trip(t) => Some(t),
            _ => None,
        }
    }

    /// The expense, when this payload holds one.
    pub fn as_expense(&self) -> Option<&Expense> {
        match self {
            RecordPayload::Expense(e) => Some(e),
            _ => None,
        }
    }

    /// The mileage log, when this payload holds one.
    pub fn as_mileage(&self) -> Option<&MileageLog> {
        match self {
            RecordPayload::Mileage(m) => Some(m),
            _ => None,
        }
    }

    /// Unwrap into a trip, when this payload holds one.
    pub fn into_trip(self) -> Option<Trip> {
        match self {
            RecordPayload::Trip(t) => Some(t),
            _ => None,
        }
    }

    /// Unwrap into an expense, when this payload holds one.
    pub fn into_expense(self) -> Option<Expense> {
        match self {
            RecordPayload::Expense(e) => Some(e),
            _ => None,
        }
    }

    /// Unwrap into a mileage log, when this payload holds one.
    pub fn into_mileage(self) -> Option<MileageLog> {
        match self {
            RecordPayload::Mileage(m) => Some(m),
            _ => None,
        }
    }
}
