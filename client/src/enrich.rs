//! Best-effort route-distance enrichment.
//!
//! Trips created without a measured mileage can be enriched from a
//! directions provider before transmission. Enrichment is opportunistic:
//! provider failures are swallowed and never block the sync attempt.

use async_trait::async_trait;
use roadbook_core::{round2, Trip};
use thiserror::Error;

/// Meters in one statute mile.
pub const METERS_PER_MILE: f64 = 1609.34;

/// A failed route lookup.
#[derive(Debug, Error)]
#[error("route lookup failed: {0}")]
pub struct RouteError(pub String);

/// External directions provider supplying route distances.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Distance in meters for a route from `start` to `end` (the trip's
    /// end address, when known).
    async fn route_distance_meters(
        &self,
        start: &str,
        end: Option<&str>,
    ) -> Result<f64, RouteError>;
}

/// Whether a trip qualifies for enrichment: no measured mileage yet and
/// a known start address.
pub fn needs_enrichment(trip: &Trip) -> bool {
    trip.total_miles == 0.0 && trip.start_address.is_some()
}

/// Fill a trip's mileage from a route lookup.
///
/// Returns `true` when the trip was changed. On provider failure the
/// trip is left untouched and the failure is logged.
pub async fn enrich_trip(trip: &mut Trip, provider: &dyn RouteProvider) -> bool {
    let Some(start) = trip.start_address.clone() else {
        return false;
    };

    match provider
        .route_distance_meters(&start, trip.end_address.as_deref())
        .await
    {
        Ok(meters) if meters > 0.0 => {
            trip.total_miles = round2(meters / METERS_PER_MILE);
            if let Some(cost) = trip.fuel_cost_for_miles(trip.total_miles) {
                trip.fuel_cost = cost;
            }
            trip.recompute_net_profit();
            tracing::debug!(
                id = %trip.id,
                miles = trip.total_miles,
                "enriched trip mileage from route distance"
            );
            true
        }
        Ok(_) => false,
        Err(err) => {
            tracing::debug!(id = %trip.id, %err, "route enrichment failed, continuing without");
            false
        }
    }
}
