//! Route definitions and router construction.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Management and proxy routes, without state applied.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        // Engine management
        .route("/status", get(handlers::engine::status))
        .route("/load", post(handlers::engine::load))
        .route("/start", post(handlers::engine::start))
        .route("/stop", post(handlers::engine::stop))
        .route("/models/available", get(handlers::models::available))
        // OpenAI-compatible proxy
        .route("/v1/models", get(handlers::proxy::list_models))
        .route("/v1/chat/completions", post(handlers::proxy::chat_completions))
        // Probes
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
}

/// Create the full router with CORS and request tracing.
pub fn create_router(ctx: AxumContext) -> Router {
    let cors = build_cors_layer(&ctx.cors);
    let state: AppState = Arc::new(ctx);

    api_routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
