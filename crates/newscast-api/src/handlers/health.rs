//! Health check handler.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub scheduler_running: bool,
    pub unselected_articles: Option<usize>,
}

/// Liveness plus a cheap store round trip.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let unselected_articles = state.store.articles().count_unselected().await.ok();
    Json(HealthResponse {
        status: if unselected_articles.is_some() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        scheduler_running: state.scheduler.is_started(),
        unselected_articles,
    })
}
