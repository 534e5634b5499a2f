//! Pipeline metrics.

use metrics::{counter, histogram};

use newscast_models::{ProductionStatus, Stage};

/// Metric names as constants for consistency.
pub mod names {
    pub const PRODUCTIONS_TOTAL: &str = "newscast_productions_total";
    pub const STAGE_DURATION_SECONDS: &str = "newscast_stage_duration_seconds";
    pub const SEGMENTS_RENDERED_TOTAL: &str = "newscast_segments_rendered_total";
    pub const SEGMENTS_DROPPED_TOTAL: &str = "newscast_segments_dropped_total";
    pub const ARTICLES_STORED_TOTAL: &str = "newscast_articles_stored_total";
    pub const PUBLISH_FAILURES_TOTAL: &str = "newscast_publish_failures_total";
    pub const SCHEDULER_RUNS_TOTAL: &str = "newscast_scheduler_runs_total";
    pub const SCHEDULER_SKIPS_TOTAL: &str = "newscast_scheduler_skips_total";
    pub use newscast_media::backend::{RENDER_OP_DURATION, RENDER_OP_FAILURES};
}

/// Record the final status of a run.
pub fn record_production(status: ProductionStatus, failed_stage: Option<Stage>) {
    let labels = [
        ("status", status.as_str().to_string()),
        ("stage", failed_stage.map(|s| s.as_str()).unwrap_or("none").to_string()),
    ];
    counter!(names::PRODUCTIONS_TOTAL, &labels).increment(1);
}

pub fn record_stage_duration(stage: Stage, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.as_str()).record(duration_secs);
}

/// Record one item clip.
pub fn record_segment(placeholder: bool) {
    counter!(names::SEGMENTS_RENDERED_TOTAL, "placeholder" => placeholder.to_string()).increment(1);
}

pub fn record_segment_dropped() {
    counter!(names::SEGMENTS_DROPPED_TOTAL).increment(1);
}

pub fn record_articles_stored(source: &str, count: usize) {
    counter!(names::ARTICLES_STORED_TOTAL, "source" => source.to_string()).increment(count as u64);
}

pub fn record_publish_failure() {
    counter!(names::PUBLISH_FAILURES_TOTAL).increment(1);
}

pub fn record_scheduler_run(job_id: &str, ok: bool) {
    let labels = [("job", job_id.to_string()), ("ok", ok.to_string())];
    counter!(names::SCHEDULER_RUNS_TOTAL, &labels).increment(1);
}

/// A trigger fired while the job was still running.
pub fn record_scheduler_skip(job_id: &str) {
    counter!(names::SCHEDULER_SKIPS_TOTAL, "job" => job_id.to_string()).increment(1);
}
