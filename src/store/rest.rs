use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::traits::{ProgressStore, StoreError};
use crate::config::StoreConfig;
use crate::models::{ActivityId, ProgressRecord, UserId};

/// HTTP-backed progress store.
///
/// Records live at
/// `{base}/api/activities/{activity}/users/{user}/progress`; reads use
/// GET (404 means the pair has no record yet), writes use PUT and echo
/// the stored record back.
#[derive(Debug, Clone)]
pub struct RestProgressStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

#[derive(Serialize)]
struct ProgressBody {
    maximum_progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_watched: Option<u64>,
}

impl RestProgressStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        // Parse up front so a bad URL fails at construction, not on the
        // first save.
        Url::parse(&config.base_url)
            .with_context(|| format!("invalid store base URL: {}", config.base_url))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Store pointed at `base_url` with default settings.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(&StoreConfig {
            base_url: base_url.to_string(),
            ..StoreConfig::default()
        })
    }

    fn record_url(&self, activity_id: &ActivityId, user_id: &UserId) -> String {
        format!(
            "{}/api/activities/{}/users/{}/progress",
            self.base_url, activity_id, user_id
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn decode_record(response: reqwest::Response) -> Result<ProgressRecord, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ProgressStore for RestProgressStore {
    async fn fetch(&self, activity_id: &ActivityId, user_id: &UserId) -> Result<ProgressRecord> {
        let url = self.record_url(activity_id, user_id);
        debug!(%activity_id, %user_id, "fetching progress record");

        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(StoreError::from)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(%activity_id, %user_id, "no stored record");
            return Ok(ProgressRecord::absent(activity_id.clone(), user_id.clone()));
        }

        let record = Self::decode_record(response).await?;
        Ok(record)
    }

    async fn upsert(
        &self,
        activity_id: &ActivityId,
        user_id: &UserId,
        maximum_progress: f64,
        duration_watched: Option<u64>,
    ) -> Result<ProgressRecord> {
        let url = self.record_url(activity_id, user_id);
        debug!(%activity_id, %user_id, maximum_progress, "writing progress record");

        let response = self
            .request(self.client.put(&url))
            .json(&ProgressBody {
                maximum_progress,
                duration_watched,
            })
            .send()
            .await
            .map_err(StoreError::from)?;

        let record = Self::decode_record(response).await.inspect_err(|e| {
            warn!(%activity_id, %user_id, error = %e, "progress write rejected");
        })?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json(maximum: f64) -> serde_json::Value {
        json!({
            "activity_id": "a1",
            "user_id": "u1",
            "maximum_progress": maximum,
            "duration_watched": null,
            "created_at": "2024-03-01T10:00:00Z",
            "modified_at": "2024-03-01T10:05:00Z"
        })
    }

    #[tokio::test]
    async fn fetch_decodes_stored_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/activities/a1/users/u1/progress")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(record_json(42.5).to_string())
            .create_async()
            .await;

        let store = RestProgressStore::with_base_url(&server.url()).unwrap();
        let record = store
            .fetch(&ActivityId::new("a1"), &UserId::new("u1"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.maximum_progress, 42.5);
        assert!(record.created_at.is_some());
    }

    #[tokio::test]
    async fn fetch_maps_missing_record_to_zero_progress() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/activities/a1/users/u1/progress")
            .with_status(404)
            .create_async()
            .await;

        let store = RestProgressStore::with_base_url(&server.url()).unwrap();
        let record = store
            .fetch(&ActivityId::new("a1"), &UserId::new("u1"))
            .await
            .unwrap();

        assert_eq!(record.maximum_progress, 0.0);
    }

    #[tokio::test]
    async fn upsert_sends_watermark_and_returns_stored_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/activities/a1/users/u1/progress")
            .match_body(mockito::Matcher::Json(json!({"maximum_progress": 57.25})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(record_json(57.25).to_string())
            .create_async()
            .await;

        let store = RestProgressStore::with_base_url(&server.url()).unwrap();
        let record = store
            .upsert(&ActivityId::new("a1"), &UserId::new("u1"), 57.25, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.maximum_progress, 57.25);
    }

    #[tokio::test]
    async fn upsert_surfaces_server_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/api/activities/a1/users/u1/progress")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let store = RestProgressStore::with_base_url(&server.url()).unwrap();
        let err = store
            .upsert(&ActivityId::new("a1"), &UserId::new("u1"), 10.0, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn auth_token_is_sent_as_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/activities/a1/users/u1/progress")
            .match_header("authorization", "Bearer sekrit")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(record_json(1.0).to_string())
            .create_async()
            .await;

        let store = RestProgressStore::new(&StoreConfig {
            base_url: server.url(),
            auth_token: Some("sekrit".to_string()),
            ..StoreConfig::default()
        })
        .unwrap();

        store
            .fetch(&ActivityId::new("a1"), &UserId::new("u1"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn rejects_malformed_base_url() {
        assert!(RestProgressStore::with_base_url("not a url").is_err());
    }
}
