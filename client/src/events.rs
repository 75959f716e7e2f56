//! Typed sync observability: engine state and event broadcasts.

use roadbook_core::{RecordId, RecordType};

/// Where the sync engine currently stands, as surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// No connectivity; mutations queue up locally
    Offline,
    /// Connected, nothing in flight
    Online,
    /// A drain is in progress
    Syncing,
    /// The last drain emptied the queue
    Synced,
    /// The last drain left a failure behind
    Error(String),
}

impl SyncState {
    /// Short label for logs and badges.
    pub fn label(&self) -> &str {
        match self {
            SyncState::Offline => "offline",
            SyncState::Online => "online",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::Error(_) => "error",
        }
    }
}

/// Events published by the sync engine.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The engine's observable state changed.
    StatusChanged(SyncState),
    /// A trip was enriched with a route distance before transmission.
    RecordEnriched {
        record_type: RecordType,
        id: RecordId,
        total_miles: f64,
    },
    /// A drain pass finished; `remaining` is the queue depth afterwards.
    QueueDrained { remaining: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels() {
        assert_eq!(SyncState::Offline.label(), "offline");
        assert_eq!(SyncState::Error("boom".into()).label(), "error");
    }
}
