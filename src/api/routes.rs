use crate::api::{handlers, AppState};
use crate::metrics::MetricsLayer;
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Default request timeout when none is configured
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    build_router_with_timeout(state, DEFAULT_TIMEOUT)
}

pub fn build_router_with_timeout(state: AppState, timeout: Duration) -> Router {
    Router::new()
        // Service endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/keywords", get(handlers::keywords))
        // Blocker detection
        .route("/detect-blockers", post(handlers::detect_blockers))
        .route("/analyze-comments", post(handlers::analyze_comments))
        .route("/analyze-task", post(handlers::analyze_task))
        // Timeline prediction
        .route("/predict-timeline", post(handlers::predict_timeline))
        .route("/predict-bulk", post(handlers::predict_bulk))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(MetricsLayer)
        .layer(TimeoutLayer::new(timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
