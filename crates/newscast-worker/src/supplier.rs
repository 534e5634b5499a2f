//! Content suppliers.
//!
//! A supplier returns normalized [`ArticleDraft`]s; storage and selection are
//! handled elsewhere. The shipped supplier reads JSON feeds over HTTP, either
//! JSON Feed documents (`{"items": [...]}`) or a bare array of items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use newscast_models::ArticleDraft;
use newscast_store::Store;

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

/// Source of news items.
#[async_trait]
pub trait ContentSupplier: Send + Sync {
    /// Identifier recorded as the article source.
    fn name(&self) -> &str;

    /// Fetch up to `limit` items.
    async fn fetch(&self, limit: usize) -> PipelineResult<Vec<ArticleDraft>>;
}

/// One entry of a JSON feed. Field aliases cover JSON Feed 1.1 and common
/// ad-hoc feed shapes.
#[derive(Debug, Deserialize)]
struct FeedItem {
    title: Option<String>,
    #[serde(alias = "link")]
    url: Option<String>,
    #[serde(alias = "description")]
    summary: Option<String>,
    #[serde(alias = "content_text", alias = "content")]
    body: Option<String>,
    #[serde(alias = "image")]
    image_url: Option<String>,
    #[serde(alias = "date_published", alias = "published")]
    published_at: Option<DateTime<Utc>>,
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedDocument {
    Feed {
        #[serde(default)]
        title: Option<String>,
        items: Vec<FeedItem>,
    },
    List(Vec<FeedItem>),
}

impl FeedDocument {
    fn into_items(self) -> Vec<FeedItem> {
        match self {
            FeedDocument::Feed { items, .. } => items,
            FeedDocument::List(items) => items,
        }
    }
}

impl FeedItem {
    fn into_draft(self, source: &str) -> Option<ArticleDraft> {
        let category = self.category.or_else(|| self.tags.into_iter().next());
        let draft = ArticleDraft {
            source: source.to_string(),
            title: self.title?,
            url: self.url?,
            summary: self.summary.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            image_url: self.image_url,
            published_at: self.published_at,
            category,
        }
        .normalized();
        draft.is_valid().then_some(draft)
    }
}

/// Parse a feed body into drafts, dropping items without a title or URL.
pub fn parse_feed(body: &[u8], source: &str) -> PipelineResult<Vec<ArticleDraft>> {
    let document: FeedDocument = serde_json::from_slice(body)
        .map_err(|e| PipelineError::acquisition(format!("{}: invalid feed: {}", source, e)))?;
    if let FeedDocument::Feed { title: Some(title), .. } = &document {
        tracing::debug!(source, feed_title = %title, "Parsed feed");
    }
    Ok(document
        .into_items()
        .into_iter()
        .filter_map(|item| item.into_draft(source))
        .collect())
}

/// Reads one JSON feed over HTTP.
pub struct JsonFeedSupplier {
    client: reqwest::Client,
    name: String,
    url: String,
    retry: RetryConfig,
}

impl JsonFeedSupplier {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        let url = url.into();
        let name = reqwest::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.clone());
        Self {
            client,
            retry: RetryConfig::new(format!("feed {}", name)),
            name,
            url,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_body(&self) -> PipelineResult<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/feed+json, application/json")
            .send()
            .await
            .map_err(|e| PipelineError::acquisition(format!("{}: {}", self.name, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::acquisition(format!("{}: HTTP {}", self.name, status)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::acquisition(format!("{}: {}", self.name, e)))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ContentSupplier for JsonFeedSupplier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, limit: usize) -> PipelineResult<Vec<ArticleDraft>> {
        let body = retry_async(&self.retry, || self.fetch_body()).await.into_result()?;
        let mut drafts = parse_feed(&body, &self.name)?;
        drafts.truncate(limit);
        Ok(drafts)
    }
}

/// Build one supplier per configured feed URL.
pub fn feed_suppliers(urls: &[String], timeout: Duration) -> PipelineResult<Vec<Arc<dyn ContentSupplier>>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("newscast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PipelineError::config(format!("HTTP client: {}", e)))?;
    Ok(urls
        .iter()
        .map(|url| Arc::new(JsonFeedSupplier::new(client.clone(), url.clone())) as Arc<dyn ContentSupplier>)
        .collect())
}

/// Outcome of one crawl over all suppliers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub fetched: usize,
    pub inserted: usize,
    /// Suppliers that failed, with their error
    pub failures: Vec<(String, String)>,
}

/// Fetch from every supplier and store the drafts. A failing supplier is
/// logged and skipped.
pub async fn crawl(suppliers: &[Arc<dyn ContentSupplier>], store: &Store, limit_per_source: usize) -> PipelineResult<CrawlSummary> {
    let mut summary = CrawlSummary::default();
    for supplier in suppliers {
        match supplier.fetch(limit_per_source).await {
            Ok(drafts) => {
                summary.fetched += drafts.len();
                let inserted = store.articles().insert_drafts(&drafts).await?;
                metrics::record_articles_stored(supplier.name(), inserted);
                info!(source = supplier.name(), fetched = drafts.len(), inserted, "Crawled source");
                summary.inserted += inserted;
            }
            Err(e) => {
                warn!(source = supplier.name(), error = %e, "Source failed");
                summary.failures.push((supplier.name().to_string(), e.to_string()));
            }
        }
    }
    Ok(summary)
}
