use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::traits::ProgressStore;
use crate::models::{ActivityId, ProgressRecord, UserId};

/// In-process store, used by the simulator and as a stand-in where no
/// remote endpoint is available.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: Mutex<HashMap<(ActivityId, UserId), ProgressRecord>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load a record, e.g. to simulate an earlier viewing session.
    pub fn seed(&self, record: ProgressRecord) {
        let key = (record.activity_id.clone(), record.user_id.clone());
        self.records.lock().unwrap().insert(key, record);
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn fetch(&self, activity_id: &ActivityId, user_id: &UserId) -> Result<ProgressRecord> {
        let records = self.records.lock().unwrap();
        Ok(records
            .get(&(activity_id.clone(), user_id.clone()))
            .cloned()
            .unwrap_or_else(|| ProgressRecord::absent(activity_id.clone(), user_id.clone())))
    }

    async fn upsert(
        &self,
        activity_id: &ActivityId,
        user_id: &UserId,
        maximum_progress: f64,
        duration_watched: Option<u64>,
    ) -> Result<ProgressRecord> {
        let mut records = self.records.lock().unwrap();
        let now = Utc::now();

        let record = records
            .entry((activity_id.clone(), user_id.clone()))
            .and_modify(|record| {
                record.maximum_progress = maximum_progress;
                record.duration_watched = duration_watched.or(record.duration_watched);
                record.modified_at = Some(now);
            })
            .or_insert_with(|| ProgressRecord {
                activity_id: activity_id.clone(),
                user_id: user_id.clone(),
                maximum_progress,
                duration_watched,
                created_at: Some(now),
                modified_at: Some(now),
            });

        debug!(%activity_id, %user_id, maximum_progress, "stored progress record");
        Ok(record.clone())
    }
}
