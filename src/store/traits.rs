use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ActivityId, ProgressRecord, UserId};

/// Failures surfaced by store implementations. These never propagate out
/// of the tracker's public methods; the tracker absorbs them into
/// `Received` notifications.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed record: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote keeper of progress records.
///
/// `fetch` for a pair the store has never seen returns the absent record
/// (zero progress) rather than an error. `upsert` returns the
/// authoritative stored record, which confirms the write but is never
/// used to lower a local watermark.
#[async_trait]
pub trait ProgressStore: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, activity_id: &ActivityId, user_id: &UserId) -> Result<ProgressRecord>;

    async fn upsert(
        &self,
        activity_id: &ActivityId,
        user_id: &UserId,
        maximum_progress: f64,
        duration_watched: Option<u64>,
    ) -> Result<ProgressRecord>;
}
