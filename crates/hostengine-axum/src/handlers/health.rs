//! Liveness and readiness handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::{HealthResponse, ReadyResponse};
use crate::state::AppState;

/// Always 200 once the server is up; the body reflects engine health.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from_snapshot(state.status.snapshot()))
}

/// 200 only when the engine is confirmed running, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let snapshot = state.status.snapshot();
    let ready = snapshot.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready,
            state: snapshot.state,
        }),
    )
}
