//! Production record and lifecycle.
//!
//! A production is one run of the pipeline that yields (or fails to yield)
//! a single narrated video. Its status only moves forward:
//!
//! ```text
//! pending -> processing -> completed -> uploaded
//!                      \-> failed
//! ```

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::article::ArticleId;
use crate::error::{ModelError, ModelResult};
use crate::publish::{EngagementMetrics, PublishResult};

/// Row identifier of a production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProductionId(pub i64);

impl ProductionId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProductionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductionId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Production lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    /// Record created, no work started
    #[default]
    Pending,
    /// Pipeline stages running
    Processing,
    /// Final video written
    Completed,
    /// A stage failed and the run was aborted
    Failed,
    /// Video accepted by the publisher
    Uploaded,
}

impl ProductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStatus::Pending => "pending",
            ProductionStatus::Processing => "processing",
            ProductionStatus::Completed => "completed",
            ProductionStatus::Failed => "failed",
            ProductionStatus::Uploaded => "uploaded",
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProductionStatus::Failed | ProductionStatus::Uploaded)
    }

    /// A final video exists for this status.
    pub fn has_output(&self) -> bool {
        matches!(self, ProductionStatus::Completed | ProductionStatus::Uploaded)
    }

    pub fn can_transition_to(&self, next: ProductionStatus) -> bool {
        use ProductionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Uploaded)
        )
    }
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProductionStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProductionStatus::Pending),
            "processing" => Ok(ProductionStatus::Processing),
            "completed" => Ok(ProductionStatus::Completed),
            "failed" => Ok(ProductionStatus::Failed),
            "uploaded" => Ok(ProductionStatus::Uploaded),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}

/// Pipeline stage, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Selection,
    Planning,
    Synthesis,
    Rendering,
    Composition,
    Thumbnail,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Selection => "selection",
            Stage::Planning => "planning",
            Stage::Synthesis => "synthesis",
            Stage::Rendering => "rendering",
            Stage::Composition => "composition",
            Stage::Thumbnail => "thumbnail",
            Stage::Publish => "publish",
        }
    }

    /// Human-readable label recorded when the stage aborts a run.
    pub fn failure_label(&self) -> &'static str {
        match self {
            Stage::Selection => "no content",
            Stage::Planning => "planning failed",
            Stage::Synthesis => "synthesis failed",
            Stage::Rendering => "rendering failed",
            Stage::Composition => "composition failed",
            Stage::Thumbnail => "thumbnail failed",
            Stage::Publish => "publish failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "selection" => Ok(Stage::Selection),
            "planning" => Ok(Stage::Planning),
            "synthesis" => Ok(Stage::Synthesis),
            "rendering" => Ok(Stage::Rendering),
            "composition" => Ok(Stage::Composition),
            "thumbnail" => Ok(Stage::Thumbnail),
            "publish" => Ok(Stage::Publish),
            other => Err(ModelError::UnknownStage(other.to_string())),
        }
    }
}

/// Persistent record of one production run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Production {
    pub id: ProductionId,
    pub title: String,
    /// Serialized narration plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(default)]
    pub article_ids: Vec<ArticleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    /// Set only once composition succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    pub status: ProductionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default)]
    pub uploaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: EngagementMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

impl Production {
    /// Create a pending production.
    pub fn new(id: ProductionId, title: impl Into<String>, article_ids: Vec<ArticleId>) -> Self {
        Self {
            id,
            title: title.into(),
            narration: None,
            article_ids,
            audio_path: None,
            video_path: None,
            thumbnail_path: None,
            duration_secs: None,
            status: ProductionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            external_id: None,
            external_url: None,
            uploaded: false,
            uploaded_at: None,
            metrics: EngagementMetrics::default(),
            failure_stage: None,
            failure_message: None,
        }
    }

    /// Move to `next`, rejecting anything that is not a forward edge.
    pub fn transition(&mut self, next: ProductionStatus) -> ModelResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start_processing(&mut self) -> ModelResult<()> {
        self.transition(ProductionStatus::Processing)
    }

    /// Mark the video as produced.
    pub fn complete(&mut self, video_path: PathBuf, duration_secs: f64) -> ModelResult<()> {
        self.transition(ProductionStatus::Completed)?;
        self.video_path = Some(video_path);
        self.duration_secs = Some(duration_secs);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Abort the run at `stage`.
    pub fn fail(&mut self, stage: Stage, message: impl Into<String>) -> ModelResult<()> {
        self.transition(ProductionStatus::Failed)?;
        self.failure_stage = Some(stage);
        self.failure_message = Some(message.into());
        Ok(())
    }

    pub fn mark_uploaded(&mut self, result: &PublishResult) -> ModelResult<()> {
        self.transition(ProductionStatus::Uploaded)?;
        self.external_id = Some(result.external_id.clone());
        self.external_url = Some(result.url.clone());
        self.uploaded = true;
        self.uploaded_at = Some(Utc::now());
        Ok(())
    }
}
