use uuid::Uuid;

use crate::models::{ProgressRecord, TrackerSnapshot};

/// Notification kinds observers can subscribe to. Delivery order is only
/// defined within one kind, never across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The tracker state changed locally.
    Updated,
    /// A store round-trip completed, successfully or not.
    Received,
}

/// Notification payloads dispatched by the tracker.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    Updated {
        snapshot: TrackerSnapshot,
    },
    Received {
        /// Correlation id stamped on the request when it was fired, for
        /// matching against the request log line.
        request_id: Uuid,
        /// The authoritative record from the store, or the failure text.
        outcome: Result<ProgressRecord, String>,
    },
}

impl TrackerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TrackerEvent::Updated { .. } => EventKind::Updated,
            TrackerEvent::Received { .. } => EventKind::Received,
        }
    }
}
