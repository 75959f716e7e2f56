//! # Roadbook Client
//!
//! On-device half of the Roadbook sync pipeline: a durable SQLite-backed
//! local store, a persisted pending-mutation queue, and the sync engine
//! that drains the queue to the cloud record service when connectivity
//! allows.
//!
//! ## Architecture
//!
//! - [`LocalStore`]: durable storage for records, trash, the queue, and
//!   sync watermarks. Local operations never depend on network state.
//! - [`SyncQueue`]: FIFO queue of [`PendingMutation`] items persisted in
//!   the local store, surviving restarts.
//! - [`SyncEngine`]: applies user mutations optimistically, enqueues them,
//!   and drains the queue one item at a time while online. Failures are
//!   classified fatal (dropped after one attempt) or transient (retried a
//!   bounded number of times). The engine never returns errors to its
//!   caller for sync outcomes; state is observable through
//!   [`SyncEngine::status`], [`SyncEngine::pending_count`],
//!   [`SyncEngine::last_dropped`], and the typed event stream from
//!   [`SyncEngine::subscribe`].
//! - [`RecordApi`]: the HTTP seam to the cloud record service, with
//!   [`HttpRecordApi`] as the reqwest implementation. Tests inject mocks.
//! - [`RouteProvider`]: best-effort route-distance enrichment applied to
//!   unmeasured trips before transmission.
//!
//! [`PendingMutation`]: roadbook_core::PendingMutation

pub mod api;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod events;
pub mod mutations;
pub mod queue;
pub mod store;

pub use api::{ApiError, HttpRecordApi, RecordApi};
pub use engine::{SyncEngine, SyncOptions};
pub use enrich::{RouteError, RouteProvider, METERS_PER_MILE};
pub use error::{ClientError, Result};
pub use events::{SyncEvent, SyncState};
pub use queue::SyncQueue;
pub use store::LocalStore;

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> roadbook_core::Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
