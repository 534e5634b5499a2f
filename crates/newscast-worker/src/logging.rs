//! Structured run logging.
//!
//! Gives every production run the same start / progress / warning / error /
//! completion events, tagged with the run's production id and stage.

use tracing::{error, info, warn, Span};

use newscast_models::{ProductionId, Stage};

/// Logger bound to one run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run: String,
    production_id: Option<ProductionId>,
}

impl RunLogger {
    /// `run` names what is running (e.g. `create_video`, a scheduler job id).
    pub fn new(run: &str) -> Self {
        Self {
            run: run.to_string(),
            production_id: None,
        }
    }

    /// Attach the production once its row exists.
    pub fn with_production(mut self, id: ProductionId) -> Self {
        self.production_id = Some(id);
        self
    }

    fn production_field(&self) -> i64 {
        self.production_id.map(|id| id.as_i64()).unwrap_or(-1)
    }

    pub fn log_start(&self, message: &str) {
        info!(run = %self.run, production_id = self.production_field(), "Run started: {}", message);
    }

    pub fn log_stage(&self, stage: Stage, message: &str) {
        info!(
            run = %self.run,
            production_id = self.production_field(),
            stage = stage.as_str(),
            "Stage: {}", message
        );
    }

    pub fn log_warning(&self, stage: Stage, message: &str) {
        warn!(
            run = %self.run,
            production_id = self.production_field(),
            stage = stage.as_str(),
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, stage: Stage, message: &str) {
        error!(
            run = %self.run,
            production_id = self.production_field(),
            stage = stage.as_str(),
            "Run failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(run = %self.run, production_id = self.production_field(), "Run completed: {}", message);
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    pub fn production_id(&self) -> Option<ProductionId> {
        self.production_id
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run = %self.run, production_id = self.production_field())
    }
}
