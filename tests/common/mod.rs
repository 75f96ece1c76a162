use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use watchmark::{ActivityId, ProgressRecord, ProgressStore, UserId};

/// Store that remembers every watermark handed to it, for asserting on
/// write volume and ordering.
#[derive(Debug, Default)]
pub struct RecordingStore {
    seeded_maximum: Mutex<Option<f64>>,
    writes: Mutex<Vec<f64>>,
}

impl RecordingStore {
    pub fn seeded(maximum_progress: f64) -> Self {
        Self {
            seeded_maximum: Mutex::new(Some(maximum_progress)),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn writes(&self) -> Vec<f64> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressStore for RecordingStore {
    async fn fetch(&self, activity_id: &ActivityId, user_id: &UserId) -> Result<ProgressRecord> {
        let mut record = ProgressRecord::absent(activity_id.clone(), user_id.clone());
        if let Some(maximum) = *self.seeded_maximum.lock().unwrap() {
            record.maximum_progress = maximum;
        }
        Ok(record)
    }

    async fn upsert(
        &self,
        activity_id: &ActivityId,
        user_id: &UserId,
        maximum_progress: f64,
        _duration_watched: Option<u64>,
    ) -> Result<ProgressRecord> {
        self.writes.lock().unwrap().push(maximum_progress);
        Ok(ProgressRecord {
            activity_id: activity_id.clone(),
            user_id: user_id.clone(),
            maximum_progress,
            duration_watched: None,
            created_at: None,
            modified_at: None,
        })
    }
}

/// Let spawned save and timer tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
