//! Scheduler job handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use newscast_worker::JobInfo;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobInfo>> {
    Json(state.scheduler.list_jobs())
}

#[derive(Debug, Serialize)]
pub struct RunJobResponse {
    pub job_id: String,
    pub status: &'static str,
}

/// Start a job now. 409 while the job is already running.
pub async fn run_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<RunJobResponse>)> {
    state.scheduler.run_now(&job_id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RunJobResponse {
            job_id,
            status: "started",
        }),
    ))
}
