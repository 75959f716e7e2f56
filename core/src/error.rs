//! Error types for the Roadbook domain.

use crate::{RecordId, RecordType};
use thiserror::Error;

/// All possible errors from the domain and lifecycle layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("record is not deleted: {0}")]
    NotDeleted(RecordId),

    // Cross-entity lifecycle errors
    #[error("Parent trip is deleted")]
    ParentTripDeleted,

    #[error("linked trip is missing or deleted: {0}")]
    TripConflict(RecordId),

    // Payload errors
    #[error("invalid record payload: {0}")]
    InvalidPayload(String),

    #[error("record type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: RecordType,
        got: RecordType,
    },
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, Error>;
