//! HTTP route definitions.

mod api;

use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(api::routes())
}

/// Readiness summary for load balancers and local setups.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Storage backend reachability, checked with a live round trip
    pub storage: &'static str,
}

/// Health check handler. A listing against the storage backend verifies
/// it is actually reachable, not just configured.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage_ok = state.trips().list("health-check", None).await.is_ok();
    Json(HealthResponse {
        status: if storage_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        storage: if storage_ok { "ok" } else { "unavailable" },
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Roadbook Record Service"
}
