//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/user", get(http::http_get_user))
        // AI-backed
        .route("/api/v1/questions/generate", post(http::http_post_generate))
        .route("/api/v1/answers", post(http::http_post_answer))
        .route("/api/v1/answers/batch", post(http::http_post_batch))
        .route("/api/v1/feedback/:question_id", get(http::http_get_feedback))
        // Dashboard
        .route("/api/v1/stats", get(http::http_get_stats))
        .route("/api/v1/specialties", get(http::http_get_specialties))
        .route("/api/v1/activity", get(http::http_get_activity))
        .route("/api/v1/performance", get(http::http_get_performance))
        .route("/api/v1/performance/specialty", get(http::http_get_performance_by_specialty))
        .route("/api/v1/performance/progress", get(http::http_get_progress))
        .route("/api/v1/performance/activity", get(http::http_get_weekly_activity))
        .route("/api/v1/resources/:kind", get(http::http_get_resources))
        // Gateway operations
        .route("/api/v1/providers", get(http::http_get_providers))
        .route("/api/v1/providers/reset", post(http::http_post_reset_providers))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}
