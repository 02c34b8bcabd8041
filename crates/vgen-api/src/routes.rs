//! API routes.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{get_job_artifact, get_job_status, health, list_jobs, ready, submit_job};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/jobs", get(list_jobs).post(submit_job))
        .route("/jobs/:job_id", get(get_job_status))
        .route("/jobs/:job_id/artifact", get(get_job_artifact));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", job_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer(&state.config.cors_origins))
                .layer(middleware::from_fn(request_logging))
                .layer(middleware::from_fn(request_id))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn(metrics_middleware))
                .layer(RequestBodyLimitLayer::new(state.config.max_body_size)),
        )
        .with_state(state)
}
