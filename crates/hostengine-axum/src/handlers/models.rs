//! Installed model listing.

use axum::Json;
use axum::extract::State;

use hostengine_core::scan_model_directory;

use crate::dto::AvailableModelsResponse;
use crate::error::HttpError;
use crate::state::AppState;

/// Model folders in the configured model directory.
pub async fn available(
    State(state): State<AppState>,
) -> Result<Json<AvailableModelsResponse>, HttpError> {
    let models = scan_model_directory(&state.config.model_directory)
        .await
        .map_err(|e| {
            HttpError::Internal(format!(
                "Failed to read model directory {}: {e}",
                state.config.model_directory.display()
            ))
        })?;
    Ok(Json(AvailableModelsResponse { models }))
}
