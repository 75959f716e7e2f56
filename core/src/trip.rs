//! Trip records and their money/mileage rollups.

use crate::{round2, RecordId, SyncStatus, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A stop along a trip with its earnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStop {
    /// Stop address
    pub address: String,
    /// Earnings collected at this stop
    #[serde(default)]
    pub earnings: f64,
    /// Position in the route, starting at 0
    #[serde(default)]
    pub order: u32,
}

/// A logged driving shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    /// Unique id within the owning user's records
    #[serde(default)]
    pub id: RecordId,
    /// Owning user
    #[serde(default)]
    pub user_id: UserId,
    /// Calendar date of the trip (ISO `YYYY-MM-DD`)
    pub date: String,
    /// Shift start time, free-form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Shift end time, free-form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Route origin address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_address: Option<String>,
    /// Route destination address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_address: Option<String>,
    /// Ordered intermediate stops with per-stop earnings
    #[serde(default)]
    pub stops: Vec<TripStop>,
    /// Total miles driven; zero means not yet measured
    #[serde(default)]
    pub total_miles: f64,
    /// Fuel cost for the trip
    #[serde(default)]
    pub fuel_cost: f64,
    /// Maintenance cost attributed to the trip
    #[serde(default)]
    pub maintenance_cost: f64,
    /// Supplies cost attributed to the trip
    #[serde(default)]
    pub supplies_cost: f64,
    /// Gross earnings for the trip
    #[serde(default)]
    pub total_earnings: f64,
    /// Earnings minus all cost fields
    #[serde(default)]
    pub net_profit: f64,
    /// Vehicle fuel economy in miles per gallon, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_mpg: Option<f64>,
    /// Gas price per gallon used for fuel cost estimates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<f64>,
    /// When the record was first created (milliseconds since epoch)
    #[serde(default)]
    pub created_at: Timestamp,
    /// When the record was last written, by anyone
    #[serde(default)]
    pub updated_at: Timestamp,
    /// When the user last edited the record; used for conflict detection
    #[serde(default)]
    pub last_modified: Timestamp,
    /// Position in the sync pipeline
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// When the record was last acknowledged by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<Timestamp>,
}

impl Trip {
    /// Create a new trip with zeroed rollups.
    pub fn new(
        id: impl Into<RecordId>,
        user_id: impl Into<UserId>,
        date: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            date: date.into(),
            start_time: None,
            end_time: None,
            start_address: None,
            end_address: None,
            stops: Vec::new(),
            total_miles: 0.0,
            fuel_cost: 0.0,
            maintenance_cost: 0.0,
            supplies_cost: 0.0,
            total_earnings: 0.0,
            net_profit: 0.0,
            vehicle_mpg: None,
            gas_price: None,
            created_at: timestamp,
            updated_at: timestamp,
            last_modified: timestamp,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
        }
    }

    /// Recompute `net_profit` from earnings and the three cost fields.
    pub fn recompute_net_profit(&mut self) {
        self.net_profit = round2(
            self.total_earnings - self.fuel_cost - self.maintenance_cost - self.supplies_cost,
        );
    }

    /// Sum of per-stop earnings.
    pub fn stop_earnings(&self) -> f64 {
        round2(self.stops.iter().map(|s| s.earnings).sum())
    }

    /// Estimate fuel cost for a mileage using the stored mpg and gas price.
    ///
    /// Returns `None` when either figure is missing or mpg is zero.
    pub fn fuel_cost_for_miles(&self, miles: f64) -> Option<f64> {
        let mpg = self.vehicle_mpg?;
        let gas_price = self.gas_price?;
        if mpg <= 0.0 {
            return None;
        }
        Some(round2(miles / mpg * gas_price))
    }

    /// Bump `updated_at` for a system-side write.
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }

    /// Record a user-initiated edit: bumps both timestamps and re-queues
    /// the trip for sync.
    pub fn mark_edited(&mut self, now: Timestamp) {
        self.updated_at = now;
        self.last_modified = now;
        self.sync_status = SyncStatus::Pending;
    }
}
