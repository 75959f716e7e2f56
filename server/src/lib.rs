//! # Roadbook Server
//!
//! Cloud half of the Roadbook sync pipeline: one authoritative record
//! service per entity type (trips, expenses, mileage logs) over a
//! key-value backend, with the soft-delete/restore lifecycle and the
//! cross-entity cascade rules enforced at the request-handling layer.
//!
//! The HTTP surface follows the collection contract the on-device sync
//! engine speaks: `POST/GET /api/{collection}`,
//! `PUT/DELETE /api/{collection}/{id}`, and the trash endpoints under
//! `/api/trash`. Delta listings (`?since=`) include tombstones so
//! deletions propagate to other devices.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod kv;
pub mod routes;
pub mod service;

use crate::clock::Clock;
use crate::config::Config;
use crate::kv::KvStore;
use crate::service::RecordService;
use axum::Router;
use roadbook_core::RecordType;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    trips: RecordService,
    expenses: RecordService,
    mileage: RecordService,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the three record services over one backend and clock.
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            trips: RecordService::new(RecordType::Trip, Arc::clone(&kv), Arc::clone(&clock)),
            expenses: RecordService::new(RecordType::Expense, Arc::clone(&kv), Arc::clone(&clock)),
            mileage: RecordService::new(RecordType::Mileage, kv, Arc::clone(&clock)),
            config: Arc::new(config),
            clock,
        }
    }

    /// The service owning one record type.
    pub fn service(&self, kind: RecordType) -> &RecordService {
        match kind {
            RecordType::Trip => &self.trips,
            RecordType::Expense => &self.expenses,
            RecordType::Mileage => &self.mileage,
        }
    }

    /// The trip service.
    pub fn trips(&self) -> &RecordService {
        &self.trips
    }

    /// The expense service.
    pub fn expenses(&self) -> &RecordService {
        &self.expenses
    }

    /// The mileage service.
    pub fn mileage(&self) -> &RecordService {
        &self.mileage
    }
}

/// Build the full application router with tracing and CORS layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
