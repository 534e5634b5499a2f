//! Scheduled jobs wired to the orchestrator.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use newscast_models::ProductionId;

use crate::config::SchedulerConfig;
use crate::error::PipelineResult;
use crate::orchestrator::{ProductionOrchestrator, RunOptions};
use crate::scheduler::{ScheduleRunner, Trigger};
use crate::supplier::{crawl, feed_suppliers};

/// Id of the daily production job.
pub const DAILY_JOB_ID: &str = "daily_video_generation";

/// Id of the one-off job publishing `production`.
pub fn upload_job_id(production: ProductionId) -> String {
    format!("upload_video_{}", production)
}

/// Daily trigger from the scheduler config.
pub fn daily_trigger(config: &SchedulerConfig) -> Trigger {
    Trigger::Daily {
        hour: config.daily_run_time.hour,
        minute: config.daily_run_time.minute,
        utc_offset_minutes: config.utc_offset_minutes,
    }
}

/// Crawl the configured feeds into the store.
///
/// Crawl problems are logged only; articles left from earlier crawls can
/// still make a video.
pub async fn refresh_articles(orchestrator: &ProductionOrchestrator) {
    let supplier = &orchestrator.config().supplier;
    if supplier.feed_urls.is_empty() {
        return;
    }
    let suppliers = match feed_suppliers(&supplier.feed_urls, supplier.request_timeout) {
        Ok(suppliers) => suppliers,
        Err(e) => {
            warn!(error = %e, "Feeds unavailable, producing from stored articles");
            return;
        }
    };
    match crawl(&suppliers, orchestrator.store(), supplier.limit_per_source).await {
        Ok(summary) => info!(
            fetched = summary.fetched,
            inserted = summary.inserted,
            failed_sources = summary.failures.len(),
            "Feeds crawled"
        ),
        Err(e) => warn!(error = %e, "Crawl failed, producing from stored articles"),
    }
}

/// Daily job body: fresh articles, then one production.
pub async fn crawl_and_produce(orchestrator: &ProductionOrchestrator, options: RunOptions) -> PipelineResult<()> {
    refresh_articles(orchestrator).await;
    orchestrator.run(options).await.ensure_success()
}

/// Register the daily crawl and production run. Returns its first fire time.
pub fn schedule_daily_production(
    runner: &ScheduleRunner,
    orchestrator: Arc<ProductionOrchestrator>,
    options: RunOptions,
) -> Option<DateTime<Utc>> {
    let trigger = daily_trigger(&orchestrator.config().scheduler);
    runner.schedule(DAILY_JOB_ID, trigger, move || {
        let orchestrator = orchestrator.clone();
        async move { crawl_and_produce(&orchestrator, options).await }
    })
}

/// Register a one-off publish of a completed production at `at`.
pub fn schedule_upload(
    runner: &ScheduleRunner,
    orchestrator: Arc<ProductionOrchestrator>,
    production: ProductionId,
    at: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    runner.schedule(upload_job_id(production), Trigger::Once(at), move || {
        let orchestrator = orchestrator.clone();
        async move { orchestrator.publish_existing(production).await.map(|_| ()) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DailyTime;

    #[test]
    fn test_job_ids() {
        assert_eq!(upload_job_id(ProductionId(12)), "upload_video_12");
        assert_eq!(DAILY_JOB_ID, "daily_video_generation");
    }

    #[test]
    fn test_daily_trigger_from_config() {
        let config = SchedulerConfig {
            daily_run_time: DailyTime { hour: 6, minute: 30 },
            utc_offset_minutes: -180,
            ..Default::default()
        };
        assert_eq!(
            daily_trigger(&config),
            Trigger::Daily {
                hour: 6,
                minute: 30,
                utc_offset_minutes: -180
            }
        );
    }
}
