//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    health, list_clips, navigate, ready, reset_video, review_stats, skip_clip, submit_qa, unlock_clip,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let review_routes = Router::new()
        .route("/clips", get(list_clips))
        .route("/clips/navigate", post(navigate))
        .route("/clips/stats", get(review_stats))
        .route("/clips/:clip_id/qa", post(submit_qa))
        .route("/clips/:clip_id/skip", post(skip_clip))
        .route("/clips/:clip_id/unlock", post(unlock_clip));

    let admin_routes = Router::new().route("/admin/videos/:video_id/reset", post(reset_video));

    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    let api_routes = Router::new()
        .merge(review_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
