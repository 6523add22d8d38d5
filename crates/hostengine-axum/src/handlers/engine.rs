//! Engine lifecycle handlers: status, load (hot-swap), start, stop.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use tracing::info;

use hostengine_core::StatusSnapshot;

use super::run_detached;
use crate::dto::{LoadRequest, LoadResponse, StartQuery, StartResponse, StopResponse};
use crate::error::HttpError;
use crate::state::AppState;

/// Current status snapshot.
pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}

/// Hot-swap to another model.
pub async fn load(
    State(state): State<AppState>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<LoadResponse>, HttpError> {
    let model = req.model.trim().to_string();
    if model.is_empty() {
        return Err(HttpError::BadRequest("model must not be empty".to_string()));
    }
    if req.max_tokens == Some(0) {
        return Err(HttpError::BadRequest(
            "max_tokens must be at least 1".to_string(),
        ));
    }

    info!(%model, max_tokens = ?req.max_tokens, "Load requested");
    let supervisor = Arc::clone(&state.supervisor);
    let target = model.clone();
    run_detached(async move { supervisor.swap(target, req.max_tokens).await }).await??;

    Ok(Json(LoadResponse::loaded(model)))
}

/// Start the engine with the given or default model.
pub async fn start(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
) -> Result<Json<StartResponse>, HttpError> {
    let requested = query.model.filter(|m| !m.trim().is_empty());
    let supervisor = Arc::clone(&state.supervisor);
    let model = requested.clone();
    run_detached(async move { supervisor.start(model).await }).await??;

    // An engine that was already running keeps its model.
    let model = state
        .supervisor
        .current_model()
        .or(requested)
        .unwrap_or_else(|| state.config.default_model.clone());
    Ok(Json(StartResponse {
        status: "started".to_string(),
        model,
    }))
}

/// Stop the engine and disable crash recovery.
pub async fn stop(State(state): State<AppState>) -> Result<Json<StopResponse>, HttpError> {
    let supervisor = Arc::clone(&state.supervisor);
    run_detached(async move { supervisor.stop().await }).await?;

    Ok(Json(StopResponse {
        status: "stopped".to_string(),
    }))
}
