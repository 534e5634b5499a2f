//! Newscast production pipeline.
//!
//! This crate provides:
//! - Content suppliers and crawling into the article store
//! - Script composition, narration synthesis and image fetching
//! - The production orchestrator driving one run end to end
//! - Publishing and engagement polling
//! - An in-process job scheduler with graceful shutdown

pub mod composer;
pub mod config;
pub mod error;
pub mod images;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod publisher;
pub mod retry;
pub mod scheduler;
pub mod supplier;
pub mod synth;

pub use composer::{ScriptComposer, TemplateComposer};
pub use config::NewscastConfig;
pub use error::{PipelineError, PipelineResult};
pub use images::{search_query, HttpImageFetcher, ImageSource, StockImageSearch, StockProvider};
pub use logging::RunLogger;
pub use orchestrator::{Collaborators, ProductionOrchestrator, RunOptions, RunReport, StageOutcome};
pub use publisher::{HttpPublisher, Publisher};
pub use scheduler::{JobInfo, ScheduleRunner, Trigger};
pub use supplier::{crawl, feed_suppliers, ContentSupplier, CrawlSummary, JsonFeedSupplier};
pub use synth::{CommandSynthesizer, NarrationSynthesizer};
