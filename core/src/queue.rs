//! Pending mutation queue model and failure classification.
//!
//! Offline writes are captured as pending mutations and drained to the
//! backend in FIFO order. Transient failures are retried a bounded number
//! of times; client errors are terminal on the first attempt.

use crate::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// Retries allowed for a transiently failing mutation before it is dropped.
pub const MAX_RETRIES: u32 = 5;

/// What a pending mutation asks the backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationAction {
    Create,
    Update,
    Delete,
    Restore,
    PermanentDelete,
}

impl MutationAction {
    /// Stable string form, used for queue persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
            MutationAction::Restore => "restore",
            MutationAction::PermanentDelete => "permanentDelete",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(MutationAction::Create),
            "update" => Some(MutationAction::Update),
            "delete" => Some(MutationAction::Delete),
            "restore" => Some(MutationAction::Restore),
            "permanentDelete" => Some(MutationAction::PermanentDelete),
            _ => None,
        }
    }
}

/// A queued offline write awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    /// Queue row id, assigned by the local store in enqueue order
    pub id: i64,
    /// What to do
    pub action: MutationAction,
    /// Type of the record the mutation targets
    pub record_type: crate::RecordType,
    /// Id of the record the mutation targets
    pub target_id: RecordId,
    /// Request body for create and update, absent otherwise
    pub payload: Option<serde_json::Value>,
    /// When the mutation was captured (milliseconds since epoch)
    pub timestamp: Timestamp,
    /// Transient failures so far
    pub retries: u32,
    /// Message from the most recent failure
    pub last_error: Option<String>,
}

impl PendingMutation {
    /// Record a transient failure against this mutation.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.retries += 1;
        self.last_error = Some(message.into());
    }

    /// Whether the retry budget is spent. A mutation is dropped once it
    /// has failed more than [`MAX_RETRIES`] times.
    pub fn exhausted(&self) -> bool {
        self.retries > MAX_RETRIES
    }
}

/// Terminal versus retryable dispatch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Client error. The request will never succeed as written.
    Fatal,
    /// Network or server error. Worth retrying.
    Transient,
}

/// Classify an HTTP status code for retry purposes. 4xx responses are
/// fatal; everything else, including 5xx, is transient.
pub fn classify_status(status: u16) -> FailureKind {
    if (400..500).contains(&status) {
        FailureKind::Fatal
    } else {
        FailureKind::Transient
    }
}
