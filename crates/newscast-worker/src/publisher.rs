//! Publishers.
//!
//! The shipped publisher uploads the video as multipart form data to an HTTP
//! endpoint:
//!
//! - `POST {endpoint}/videos` with parts `metadata` (JSON), `video` and an
//!   optional `thumbnail`; the response is `{"id": ..., "url": ...}`
//! - `GET {endpoint}/videos/{id}/stats` returning `{"views", "likes", "comments"}`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use newscast_models::{Article, EngagementMetrics, PublishRequest, PublishResult};

use crate::config::PublisherConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::retry::{retry_async, RetryConfig};

/// Most article titles listed in a description.
pub const MAX_LISTED_ARTICLES: usize = 10;

/// Publishes finished videos and reports their engagement.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> PipelineResult<PublishResult>;

    async fn fetch_metrics(&self, external_id: &str) -> PipelineResult<EngagementMetrics>;
}

/// Replace `{date}` in `template`.
pub fn render_title(template: &str, date: DateTime<Utc>, date_format: &str) -> String {
    template.replace("{date}", &date.format(date_format).to_string())
}

/// Description listing up to [`MAX_LISTED_ARTICLES`] titles.
pub fn render_description(template: &str, date: DateTime<Utc>, date_format: &str, articles: &[Article]) -> String {
    let news_list = articles
        .iter()
        .take(MAX_LISTED_ARTICLES)
        .map(|a| format!("- {}", a.title))
        .collect::<Vec<_>>()
        .join("\n");
    template
        .replace("{date}", &date.format(date_format).to_string())
        .replace("{news_list}", &news_list)
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
    privacy: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(default)]
    views: u64,
    #[serde(default)]
    likes: u64,
    #[serde(default)]
    comments: u64,
}

/// Multipart upload to an HTTP video endpoint.
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    retry: RetryConfig,
}

impl HttpPublisher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: None,
            retry: RetryConfig::new("publish").with_max_retries(2),
        }
    }

    /// Publisher for the configured endpoint, or `None` when publishing is off.
    pub fn from_config(config: &PublisherConfig, client: reqwest::Client) -> Option<Self> {
        let endpoint = config.endpoint.as_deref()?;
        let mut publisher = Self::new(client, endpoint);
        publisher.token = config.token.clone();
        Some(publisher)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn file_part(path: &Path, mime: &str) -> PipelineResult<reqwest::multipart::Part> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::publish(format!("cannot read {}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        reqwest::multipart::Part::bytes(bytes)
            .file_name(name)
            .mime_str(mime)
            .map_err(|e| PipelineError::publish(e.to_string()))
    }

    async fn upload_once(&self, request: &PublishRequest, metadata: &str) -> PipelineResult<PublishResult> {
        let mut form = reqwest::multipart::Form::new()
            .text("metadata", metadata.to_string())
            .part("video", Self::file_part(&request.video_path, "video/mp4").await?);
        if let Some(thumb) = request.thumbnail_path.as_deref().filter(|p| p.exists()) {
            form = form.part("thumbnail", Self::file_part(thumb, "image/jpeg").await?);
        }

        let response = self
            .authorize(self.client.post(format!("{}/videos", self.endpoint)))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::publish(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::publish(format!("HTTP {}: {}", status, body.trim())));
        }
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::publish(format!("invalid upload response: {}", e)))?;
        Ok(PublishResult {
            external_id: body.id,
            url: body.url,
        })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, request: &PublishRequest) -> PipelineResult<PublishResult> {
        if !request.video_path.exists() {
            return Err(PipelineError::publish(format!(
                "video file missing: {}",
                request.video_path.display()
            )));
        }
        let metadata = serde_json::to_string(&UploadMetadata {
            title: &request.title,
            description: &request.description,
            tags: &request.tags,
            category: request.category.as_deref(),
            privacy: &request.privacy,
        })
        .map_err(|e| PipelineError::publish(e.to_string()))?;

        let result = retry_async(&self.retry, || self.upload_once(request, &metadata))
            .await
            .into_result()?;
        info!(external_id = %result.external_id, url = %result.url, "Video published");
        Ok(result)
    }

    async fn fetch_metrics(&self, external_id: &str) -> PipelineResult<EngagementMetrics> {
        let response = self
            .authorize(self.client.get(format!("{}/videos/{}/stats", self.endpoint, external_id)))
            .send()
            .await
            .map_err(|e| PipelineError::publish(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::publish(format!("stats request returned HTTP {}", status)));
        }
        let stats: StatsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::publish(format!("invalid stats response: {}", e)))?;
        Ok(EngagementMetrics {
            views: stats.views,
            likes: stats.likes,
            comments: stats.comments,
            refreshed_at: Some(Utc::now()),
        })
    }
}
