//! Image sources for item visuals.
//!
//! The article's own image is tried first, then any configured stock photo
//! search. A failed fetch is not fatal: the renderer substitutes a
//! placeholder.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use newscast_models::Article;

use crate::error::{PipelineError, PipelineResult};
use crate::retry::{retry_async, RetryConfig};

/// Smallest accepted image edge; anything smaller is treated as an icon.
pub const MIN_IMAGE_EDGE: u32 = 200;
/// Largest accepted download.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Words dropped when building a stock search query.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "and", "or", "in", "on", "at", "to", "for", "with", "from", "by", "as", "is", "are",
];
/// Title words kept in a stock search query.
const QUERY_WORDS: usize = 4;

/// Provides a still image for an article.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Store an image for `article` in `dest_dir` and return its path.
    async fn fetch(&self, article: &Article, dest_dir: &Path) -> PipelineResult<PathBuf>;
}

/// Check downloaded bytes decode as an image of usable size and return the
/// file extension for its format.
pub fn validate_image(bytes: &[u8]) -> PipelineResult<&'static str> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(PipelineError::render(format!("image too large ({} bytes)", bytes.len())));
    }
    let format = image::guess_format(bytes).map_err(|e| PipelineError::render(format!("unknown image format: {}", e)))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PipelineError::render(format!("undecodable image: {}", e)))?;
    if img.width() < MIN_IMAGE_EDGE || img.height() < MIN_IMAGE_EDGE {
        return Err(PipelineError::render(format!(
            "image too small ({}x{})",
            img.width(),
            img.height()
        )));
    }
    Ok(format.extensions_str().first().copied().unwrap_or("img"))
}

/// Build a stock photo query from an article's category and headline.
pub fn search_query(article: &Article) -> String {
    let mut words: Vec<String> = article.category.iter().map(|c| c.trim().to_lowercase()).collect();
    words.extend(
        article
            .title
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
            .take(QUERY_WORDS),
    );
    words.retain(|w| !w.is_empty());
    if words.is_empty() {
        "news".to_string()
    } else {
        words.join(" ")
    }
}

/// Stock photo search APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockProvider {
    Pexels,
    Unsplash,
}

impl StockProvider {
    pub fn name(&self) -> &'static str {
        match self {
            StockProvider::Pexels => "pexels",
            StockProvider::Unsplash => "unsplash",
        }
    }

    pub fn default_search_url(&self) -> &'static str {
        match self {
            StockProvider::Pexels => "https://api.pexels.com/v1/search",
            StockProvider::Unsplash => "https://api.unsplash.com/search/photos",
        }
    }

    fn authorization(&self, api_key: &str) -> String {
        match self {
            StockProvider::Pexels => api_key.to_string(),
            StockProvider::Unsplash => format!("Client-ID {}", api_key),
        }
    }
}

#[derive(Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSources,
}

#[derive(Deserialize)]
struct PexelsSources {
    large2x: String,
}

#[derive(Deserialize)]
struct UnsplashResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Deserialize)]
struct UnsplashUrls {
    regular: String,
}

/// Looks up a landscape photo URL for a query on one stock provider.
#[derive(Debug, Clone)]
pub struct StockImageSearch {
    provider: StockProvider,
    api_key: String,
    search_url: String,
}

impl StockImageSearch {
    pub fn new(provider: StockProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            search_url: provider.default_search_url().to_string(),
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    pub fn provider(&self) -> StockProvider {
        self.provider
    }

    /// First matching photo URL, or `None` when the search is empty.
    pub async fn find(&self, client: &reqwest::Client, query: &str) -> PipelineResult<Option<String>> {
        let response = client
            .get(&self.search_url)
            .header(reqwest::header::AUTHORIZATION, self.provider.authorization(&self.api_key))
            .query(&[("query", query), ("per_page", "1"), ("orientation", "landscape")])
            .send()
            .await
            .map_err(|e| PipelineError::render(format!("{} search failed: {}", self.provider.name(), e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::render(format!(
                "{} search returned HTTP {}",
                self.provider.name(),
                status
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| PipelineError::render(format!("{} search body failed: {}", self.provider.name(), e)))?;

        let malformed = |e: serde_json::Error| {
            PipelineError::render(format!("{} search response malformed: {}", self.provider.name(), e))
        };
        let url = match self.provider {
            StockProvider::Pexels => serde_json::from_slice::<PexelsResponse>(&body)
                .map_err(malformed)?
                .photos
                .into_iter()
                .next()
                .map(|p| p.src.large2x),
            StockProvider::Unsplash => serde_json::from_slice::<UnsplashResponse>(&body)
                .map_err(malformed)?
                .results
                .into_iter()
                .next()
                .map(|p| p.urls.regular),
        };
        Ok(url)
    }
}

/// Downloads the article's own lead image.
///
/// Stock searches are tried in order when the article has no usable image.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
    stock: Vec<StockImageSearch>,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            retry: RetryConfig::new("image download").with_max_retries(2),
            stock: Vec::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::config(format!("HTTP client: {}", e)))?;
        Ok(Self::new(client))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stock_search(mut self, search: StockImageSearch) -> Self {
        self.stock.push(search);
        self
    }

    async fn store(&self, url: &str, article: &Article, dest_dir: &Path) -> PipelineResult<PathBuf> {
        let bytes = retry_async(&self.retry, || self.download(url)).await.into_result()?;
        let ext = validate_image(&bytes)?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(format!("article_{}.{}", article.id, ext));
        tokio::fs::write(&path, &bytes).await?;
        debug!(article_id = %article.id, path = %path.display(), "Image stored");
        Ok(path)
    }

    async fn store_from_stock(&self, article: &Article, dest_dir: &Path) -> PipelineResult<Option<PathBuf>> {
        if self.stock.is_empty() {
            return Ok(None);
        }
        let query = search_query(article);
        for search in &self.stock {
            let provider = search.provider().name();
            let found = match search.find(&self.client, &query).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(article_id = %article.id, provider, error = %e, "Stock search failed");
                    continue;
                }
            };
            let Some(url) = found else {
                debug!(article_id = %article.id, provider, query = %query, "No stock photo found");
                continue;
            };
            match self.store(&url, article, dest_dir).await {
                Ok(path) => return Ok(Some(path)),
                Err(e) => warn!(article_id = %article.id, provider, error = %e, "Stock photo rejected"),
            }
        }
        Ok(None)
    }

    async fn download(&self, url: &str) -> PipelineResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::render(format!("image request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::render(format!("image request returned HTTP {}", status)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::render(format!("image body failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageSource for HttpImageFetcher {
    async fn fetch(&self, article: &Article, dest_dir: &Path) -> PipelineResult<PathBuf> {
        let own = match article.image_url.as_deref() {
            Some(url) => self.store(url, article, dest_dir).await,
            None => Err(PipelineError::render(format!("article {} has no image", article.id))),
        };
        let err = match own {
            Ok(path) => return Ok(path),
            Err(e) => e,
        };
        match self.store_from_stock(article, dest_dir).await? {
            Some(path) => Ok(path),
            None => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_validate_png() {
        assert_eq!(validate_image(&png_bytes(400, 300)).unwrap(), "png");
    }

    fn titled(title: &str, category: Option<&str>) -> Article {
        Article {
            id: newscast_models::ArticleId(1),
            source: "wire".to_string(),
            title: title.to_string(),
            url: "https://n.example/1".to_string(),
            summary: String::new(),
            body: String::new(),
            image_url: None,
            published_at: None,
            crawled_at: chrono::Utc::now(),
            category: category.map(str::to_string),
            selected: true,
            used_in_production: None,
        }
    }

    #[test]
    fn test_search_query() {
        assert_eq!(
            search_query(&titled("The Port of Lagos reopens after storm damage", Some("Business"))),
            "business port lagos reopens after"
        );
        assert_eq!(search_query(&titled("Rain, again!", None)), "rain again");
        assert_eq!(search_query(&titled("The", None)), "news");
    }

    #[test]
    fn test_reject_icon_and_garbage() {
        assert!(validate_image(&png_bytes(32, 32)).is_err());
        assert!(validate_image(b"<html>not an image</html>").is_err());
    }
}
