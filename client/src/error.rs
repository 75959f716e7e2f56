//! Error types for the on-device client.

use crate::api::ApiError;
use thiserror::Error;

/// All possible errors from the local store and sync engine.
#[derive(Debug, Error)]
pub enum ClientError {
    // Storage errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Sync errors
    #[error("sync request failed: {0}")]
    Api(#[from] ApiError),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] roadbook_core::Error),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
