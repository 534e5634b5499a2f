//! Application state.

use std::sync::Arc;

use newscast_store::Store;
use newscast_worker::{NewscastConfig, ProductionOrchestrator, ScheduleRunner};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<NewscastConfig>,
    pub store: Store,
    pub orchestrator: Arc<ProductionOrchestrator>,
    pub scheduler: ScheduleRunner,
}

impl AppState {
    pub fn new(orchestrator: Arc<ProductionOrchestrator>, scheduler: ScheduleRunner) -> Self {
        Self {
            config: Arc::new(orchestrator.config().clone()),
            store: orchestrator.store().clone(),
            orchestrator,
            scheduler,
        }
    }
}
