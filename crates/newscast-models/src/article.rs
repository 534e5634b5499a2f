//! News article models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::production::ProductionId;

/// Row identifier of a stored article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ArticleId(pub i64);

impl ArticleId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ArticleId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Article as returned by a content supplier, before it is stored.
///
/// Every supplier normalizes its source format into this one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArticleDraft {
    /// Source name (site or feed identifier)
    pub source: String,
    /// Headline
    pub title: String,
    /// Canonical URL, unique across all articles
    pub url: String,
    /// Short summary used for narration
    #[serde(default)]
    pub summary: String,
    /// Full body text
    #[serde(default)]
    pub body: String,
    /// Lead image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Publication timestamp reported by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Source category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ArticleDraft {
    pub fn new(source: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            url: url.into(),
            summary: String::new(),
            body: String::new(),
            image_url: None,
            published_at: None,
            category: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Trim whitespace and drop empty optional fields.
    pub fn normalized(mut self) -> Self {
        self.source = self.source.trim().to_string();
        self.title = self.title.trim().to_string();
        self.url = self.url.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.body = self.body.trim().to_string();
        self.image_url = self
            .image_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        self.category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    /// A draft needs at least a title and a URL to be stored.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }
}

/// Stored news article.
///
/// Immutable after insert except for `selected` and `used_in_production`,
/// which are each set once when the article is claimed for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Article {
    pub id: ArticleId,
    pub source: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub body: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub crawled_at: DateTime<Utc>,
    pub category: Option<String>,
    /// Whether the article has been claimed for a production
    pub selected: bool,
    /// Production the article was used in
    pub used_in_production: Option<ProductionId>,
}

impl Article {
    /// Text spoken for this article when no richer script is available.
    pub fn narration_text(&self) -> String {
        let summary = if self.summary.is_empty() {
            self.body.chars().take(400).collect::<String>()
        } else {
            self.summary.clone()
        };
        if summary.is_empty() {
            format!("{}.", self.title.trim_end_matches('.'))
        } else {
            format!("{}. {}", self.title.trim_end_matches('.'), summary)
        }
    }
}
