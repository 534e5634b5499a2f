//! Shared data models for the newscast production pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Articles supplied by content sources
//! - Narration plans and synthesized audio segments
//! - Ken Burns effects and per-item render segments
//! - Encoding configuration
//! - Production records and their lifecycle

pub mod article;
pub mod effect;
pub mod encoding;
pub mod error;
pub mod narration;
pub mod production;
pub mod publish;
pub mod render;

// Re-export common types
pub use article::{Article, ArticleDraft, ArticleId};
pub use effect::{KenBurnsEffect, KenBurnsParams};
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use narration::{combined_duration, AudioSegment, NarrationPlan, NarrationSegment, SegmentKind};
pub use production::{Production, ProductionId, ProductionStatus, Stage};
pub use publish::{EngagementMetrics, PublishRequest, PublishResult};
pub use render::RenderSegment;
