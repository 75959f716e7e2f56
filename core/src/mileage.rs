//! Mileage log records and their derivations.
//!
//! Two linking conventions coexist: the current explicit `tripId` field and
//! a legacy convention where the log shares its id with the trip it covers.
//! [`MileageLog::parent_trip`] is the single place that ambiguity is
//! resolved.

use crate::{round2, RecordId, SyncStatus, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// How a mileage log references its parent trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentLink {
    /// Explicit `tripId` field (current convention)
    Explicit(RecordId),
    /// The log id doubles as the trip id (legacy 1:1 convention)
    Legacy(RecordId),
}

impl ParentLink {
    /// The referenced trip id, whichever convention produced it.
    pub fn trip_id(&self) -> &RecordId {
        match self {
            ParentLink::Explicit(id) => id,
            ParentLink::Legacy(id) => id,
        }
    }
}

/// An odometer-based mileage entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MileageLog {
    /// Unique id within the owning user's records
    #[serde(default)]
    pub id: RecordId,
    /// Owning user
    #[serde(default)]
    pub user_id: UserId,
    /// Calendar date of the entry (ISO `YYYY-MM-DD`)
    pub date: String,
    /// Explicit link to the covered trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<RecordId>,
    /// Odometer reading at the start of the entry
    #[serde(default)]
    pub start_odometer: f64,
    /// Odometer reading at the end of the entry
    #[serde(default)]
    pub end_odometer: f64,
    /// Miles covered; zero means not explicitly set and is derived from
    /// the odometer span on normalize
    #[serde(default)]
    pub miles: f64,
    /// Reimbursement rate per mile, when configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage_rate: Option<f64>,
    /// Reimbursement amount; derived from miles and rate when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reimbursement: Option<f64>,
    /// Vehicle label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
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

/// Miles covered by an odometer span, never negative, rounded to 2 decimals.
pub fn derived_miles(start_odometer: f64, end_odometer: f64) -> f64 {
    round2((end_odometer - start_odometer).max(0.0))
}

impl MileageLog {
    /// Create a new mileage log; derivations run immediately.
    pub fn new(
        id: impl Into<RecordId>,
        user_id: impl Into<UserId>,
        date: impl Into<String>,
        start_odometer: f64,
        end_odometer: f64,
        timestamp: Timestamp,
    ) -> Self {
        let mut log = Self {
            id: id.into(),
            user_id: user_id.into(),
            date: date.into(),
            trip_id: None,
            start_odometer,
            end_odometer,
            miles: 0.0,
            mileage_rate: None,
            reimbursement: None,
            vehicle: None,
            created_at: timestamp,
            updated_at: timestamp,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
        };
        log.normalize();
        log
    }

    /// Apply the derivation rules in place.
    ///
    /// `miles` is filled from the odometer span unless explicitly set
    /// (nonzero). `reimbursement` is recomputed from miles and rate unless
    /// explicitly supplied.
    pub fn normalize(&mut self) {
        if self.miles == 0.0 {
            self.miles = derived_miles(self.start_odometer, self.end_odometer);
        } else {
            self.miles = round2(self.miles);
        }
        if self.reimbursement.is_none() {
            if let Some(rate) = self.mileage_rate {
                self.reimbursement = Some(round2(self.miles * rate));
            }
        }
    }

    /// Resolve the parent trip reference.
    ///
    /// The explicit `tripId` wins; otherwise the log's own id is the
    /// candidate under the legacy convention. A legacy link with no
    /// matching trip means the log is standalone.
    pub fn parent_trip(&self) -> ParentLink {
        match &self.trip_id {
            Some(trip_id) => ParentLink::Explicit(trip_id.clone()),
            None => ParentLink::Legacy(self.id.clone()),
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}
