mod identifiers;

pub use identifiers::{ActivityId, PlayerId, UserId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored watch-progress record for one (activity, user) pair.
///
/// Owned by the remote store; the tracker mirrors it locally and only ever
/// pushes the watermark upward. `duration_watched` is carried through the
/// schema but not computed by the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub activity_id: ActivityId,
    pub user_id: UserId,
    /// Monotonically non-decreasing watched percentage in [0, 100].
    pub maximum_progress: f64,
    #[serde(default)]
    pub duration_watched: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Record stood in for a pair the store has never seen. An absent
    /// record implies zero progress.
    pub fn absent(activity_id: ActivityId, user_id: UserId) -> Self {
        Self {
            activity_id,
            user_id,
            maximum_progress: 0.0,
            duration_watched: None,
            created_at: None,
            modified_at: None,
        }
    }
}

/// Point-in-time copy of the tracker state, delivered as the payload of
/// every `Updated` notification.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub activity_id: Option<ActivityId>,
    pub user_id: Option<UserId>,
    /// Last instantaneous sample observed, if any.
    pub current_progress: Option<f64>,
    /// Local watermark; may run ahead of the last persisted value.
    pub maximum_progress: Option<f64>,
    /// A local change has not yet been handed to the store.
    pub save_pending: bool,
    /// A trailing debounce timer is currently armed.
    pub debounce_armed: bool,
    /// Unresolved store round-trips, diagnostic only.
    pub in_flight_requests: u32,
}
