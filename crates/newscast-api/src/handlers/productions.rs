//! Production handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use newscast_models::{EngagementMetrics, Production, ProductionId, ProductionStatus, PublishResult};
use newscast_worker::jobs;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Most recent productions first.
pub async fn list_productions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Production>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.store.productions().list_recent(limit).await?))
}

pub async fn get_production(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Production>> {
    state
        .store
        .productions()
        .get(ProductionId(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("production {}", id)))
}

/// Publish a completed production now.
pub async fn publish_production(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PublishResult>> {
    Ok(Json(state.orchestrator.publish_existing(ProductionId(id)).await?))
}

/// Pull engagement counters for a published production.
pub async fn refresh_production_metrics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EngagementMetrics>> {
    Ok(Json(state.orchestrator.refresh_metrics(ProductionId(id)).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleUploadRequest {
    /// Publish time; now when absent
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleUploadResponse {
    pub job_id: String,
    pub next_run: Option<DateTime<Utc>>,
}

/// Register a one-off publish of a completed production.
///
/// 503 without a publisher, 409 unless the production is completed.
pub async fn schedule_production_upload(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ScheduleUploadRequest>,
) -> ApiResult<(StatusCode, Json<ScheduleUploadResponse>)> {
    if !state.orchestrator.has_publisher() {
        return Err(ApiError::Unavailable("publishing is not configured".to_string()));
    }
    let id = ProductionId(id);
    let production = state
        .store
        .productions()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("production {}", id)))?;
    if production.status != ProductionStatus::Completed {
        return Err(ApiError::Conflict(format!(
            "production {} is {}, only completed productions can be published",
            id,
            production.status.as_str()
        )));
    }

    let at = request.at.unwrap_or_else(Utc::now);
    let next_run = jobs::schedule_upload(&state.scheduler, state.orchestrator.clone(), id, at);
    Ok((
        StatusCode::ACCEPTED,
        Json(ScheduleUploadResponse {
            job_id: jobs::upload_job_id(id),
            next_run,
        }),
    ))
}
