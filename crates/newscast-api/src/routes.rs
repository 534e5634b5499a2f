//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::{
    get_production, health, list_jobs, list_productions, publish_production, refresh_production_metrics, run_job,
    schedule_production_upload,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;

/// Create the dashboard router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let production_routes = Router::new()
        .route("/productions", get(list_productions))
        .route("/productions/:id", get(get_production))
        .route("/productions/:id/publish", post(publish_production))
        .route("/productions/:id/schedule", post(schedule_production_upload))
        .route("/productions/:id/metrics", post(refresh_production_metrics));

    let job_routes = Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id/run", post(run_job));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .route("/health", get(health))
        .merge(production_routes)
        .merge(job_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer())
        .with_state(state)
}
