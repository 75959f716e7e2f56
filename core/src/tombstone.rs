//! Tombstones, trash listings, and the active-or-tombstone slot model.
//!
//! Soft delete overwrites a record's storage slot with a tombstone carrying
//! a full backup of the pre-delete payload. The tombstone keeps the slot
//! restorable until the retention window lapses, after which the store
//! expires it.

use crate::{RecordId, RecordPayload, RecordType, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// How long a tombstone is kept before the store expires it: 30 days.
pub const TRASH_RETENTION_SECS: u64 = 2_592_000;

/// Retention window in milliseconds.
pub const TRASH_RETENTION_MS: u64 = TRASH_RETENTION_SECS * 1000;

/// Bookkeeping carried inside a tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TombstoneMetadata {
    /// Namespaced key the record lived under before deletion
    pub original_key: String,
    /// When the tombstone expires (milliseconds since epoch)
    pub expires_at: Timestamp,
}

/// An in-place marker replacing a deleted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    /// Id of the deleted record
    pub id: RecordId,
    /// Owning user
    pub user_id: UserId,
    /// Always true; kept on the wire so readers can branch on it
    pub deleted: bool,
    /// When the record was deleted (milliseconds since epoch)
    pub deleted_at: Timestamp,
    /// Who performed the deletion
    pub deleted_by: UserId,
    /// Expiry and original-key bookkeeping
    pub metadata: TombstoneMetadata,
    /// Full copy of the pre-delete record
    pub backup: RecordPayload,
}

/// Build the namespaced trash key for a record: `{recordType}:{id}`.
///
/// Type-prefixing keeps same-id records of different types from colliding
/// in a flat trash namespace.
pub fn trash_key(record_type: RecordType, id: &str) -> String {
    format!("{}:{}", record_type.as_str(), id)
}

impl Tombstone {
    /// Tombstone a record. The backup should already carry any
    /// display-representation adjustments (see
    /// [`crate::lifecycle::backup_for_delete`]).
    pub fn new(backup: RecordPayload, deleted_by: impl Into<UserId>, deleted_at: Timestamp) -> Self {
        let original_key = trash_key(backup.record_type(), backup.id());
        Self {
            id: backup.id().clone(),
            user_id: backup.user_id().clone(),
            deleted: true,
            deleted_at,
            deleted_by: deleted_by.into(),
            metadata: TombstoneMetadata {
                original_key,
                expires_at: deleted_at + TRASH_RETENTION_MS,
            },
            backup,
        }
    }

    /// The record type of the backed-up record.
    pub fn record_type(&self) -> RecordType {
        self.backup.record_type()
    }

    /// Namespaced trash key for this tombstone.
    pub fn trash_key(&self) -> String {
        trash_key(self.record_type(), &self.id)
    }

    /// Whether the retention window has lapsed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.metadata.expires_at
    }

    /// Normalized row for trash listings.
    pub fn summary(&self) -> TrashSummary {
        TrashSummary {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            record_type: self.record_type(),
            deleted_at: self.deleted_at,
            deleted_by: self.deleted_by.clone(),
            expires_at: self.metadata.expires_at,
        }
    }
}

/// Normalized trash listing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashSummary {
    /// Id of the deleted record
    pub id: RecordId,
    /// Owning user
    pub user_id: UserId,
    /// Type of the deleted record
    pub record_type: RecordType,
    /// When the record was deleted
    pub deleted_at: Timestamp,
    /// Who deleted it
    pub deleted_by: UserId,
    /// When the tombstone expires
    pub expires_at: Timestamp,
}

/// What one storage slot holds: a live record or its tombstone.
///
/// Delta-sync listings return slots so deletions propagate to other
/// devices alongside updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordSlot {
    Tombstone(Tombstone),
    Active(RecordPayload),
}

impl RecordSlot {
    /// Id of the record the slot belongs to.
    pub fn id(&self) -> &RecordId {
        match self {
            RecordSlot::Tombstone(t) => &t.id,
            RecordSlot::Active(p) => p.id(),
        }
    }

    /// Owning user.
    pub fn user_id(&self) -> &UserId {
        match self {
            RecordSlot::Tombstone(t) => &t.user_id,
            RecordSlot::Active(p) => p.user_id(),
        }
    }

    /// Whether the slot holds a tombstone.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, RecordSlot::Tombstone(_))
    }

    /// Timestamp used for delta-sync watermark comparisons: `updatedAt`
    /// for active records, `deletedAt` for tombstones.
    pub fn watermark(&self) -> Timestamp {
        match self {
            RecordSlot::Tombstone(t) => t.deleted_at,
            RecordSlot::Active(p) => p.updated_at(),
        }
    }

    /// The active payload, when the slot is not a tombstone.
    pub fn active(&self) -> Option<&RecordPayload> {
        match self {
            RecordSlot::Tombstone(_) => None,
            RecordSlot::Active(p) => Some(p),
        }
    }

    /// The tombstone, when the slot holds one.
    pub fn tombstone(&self) -> Option<&Tombstone> {
        match self {
            RecordSlot::Tombstone(t) => Some(t),
            RecordSlot::Active(_) => None,
        }
    }
}
