//! Pipeline error types.

use newscast_media::{CompositionError, MediaError};
use newscast_models::{ModelError, Stage};
use newscast_store::StoreError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Content acquisition failed: {0}")]
    Acquisition(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Composition failed: {0}")]
    Composition(#[from] CompositionError),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Run failed at {stage}: {message}")]
    RunFailed { stage: Stage, message: String },

    #[error("Job '{0}' is already running")]
    SchedulingConflict(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Invalid state: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stage a collaborator error belongs to, if it names one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Acquisition(_) => Some(Stage::Selection),
            PipelineError::Planning(_) => Some(Stage::Planning),
            PipelineError::Synthesis(_) => Some(Stage::Synthesis),
            PipelineError::Render(_) => Some(Stage::Rendering),
            PipelineError::Composition(_) => Some(Stage::Composition),
            PipelineError::Publish(_) => Some(Stage::Publish),
            PipelineError::RunFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Acquisition(_) | PipelineError::Publish(_) | PipelineError::Io(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PipelineError::SchedulingConflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newscast_media::CompositionStep;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(PipelineError::planning("x").stage(), Some(Stage::Planning));
        let composition = PipelineError::from(CompositionError::new(CompositionStep::Music, MediaError::Timeout(5)));
        assert_eq!(composition.stage(), Some(Stage::Composition));
        assert_eq!(PipelineError::SchedulingConflict("daily".into()).stage(), None);
    }

    #[test]
    fn test_conflict_message() {
        let err = PipelineError::SchedulingConflict("daily_video_generation".into());
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Job 'daily_video_generation' is already running");
    }
}
