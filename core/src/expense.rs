//! Expense records.

use crate::{RecordId, SyncStatus, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Spending category for an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Fuel,
    Maintenance,
    Supplies,
    Parking,
    Tolls,
    Insurance,
    Phone,
    Other,
}

impl ExpenseCategory {
    /// Whether this category rolls up into a linked trip's cost fields.
    pub fn rolls_up(&self) -> bool {
        matches!(
            self,
            ExpenseCategory::Fuel | ExpenseCategory::Maintenance | ExpenseCategory::Supplies
        )
    }
}

/// A logged expense, optionally attached to a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Unique id within the owning user's records
    #[serde(default)]
    pub id: RecordId,
    /// Owning user
    #[serde(default)]
    pub user_id: UserId,
    /// Calendar date of the expense (ISO `YYYY-MM-DD`)
    pub date: String,
    /// Spending category
    pub category: ExpenseCategory,
    /// Amount spent
    pub amount: f64,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Whether the expense is tax deductible, when the user marked it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_deductible: Option<bool>,
    /// Explicit link to a trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<RecordId>,
    /// When the record was first created (milliseconds since epoch)
    #[serde(default)]
    pub created_at: Timestamp,
    /// When the record was last written
    #[serde(default)]
    pub updated_at: Timestamp,
    /// Position in the sync pipeline
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// When the record was last acknowledged by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<Timestamp>,
}

impl Expense {
    /// Create a new expense.
    pub fn new(
        id: impl Into<RecordId>,
        user_id: impl Into<UserId>,
        date: impl Into<String>,
        category: ExpenseCategory,
        amount: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            date: date.into(),
            category,
            amount,
            description: String::new(),
            tax_deductible: None,
            trip_id: None,
            created_at: timestamp,
            updated_at: timestamp,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
        }
    }

    /// Resolve the trip this expense is attached to, if any.
    ///
    /// The explicit `tripId` field wins; otherwise a composite id of the
    /// form `{tripId}:{suffix}` links via its prefix (legacy convention).
    pub fn linked_trip_id(&self) -> Option<RecordId> {
        if let Some(trip_id) = &self.trip_id {
            return Some(trip_id.clone());
        }
        self.id
            .split_once(':')
            .map(|(prefix, _)| prefix.to_string())
            .filter(|prefix| !prefix.is_empty())
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}
