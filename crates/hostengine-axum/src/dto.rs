//! Data Transfer Objects for the management API.
//!
//! Status snapshots and installed models are serialized straight from the
//! core types; only the request/acknowledgement shapes live here.

use serde::{Deserialize, Serialize};

use hostengine_core::{EngineState, InstalledModel, StatusSnapshot};

/// Body of `POST /load`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadRequest {
    pub model: String,
    /// Overrides the configured token limit for the new engine.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub status: String,
    pub model: String,
    pub message: String,
}

impl LoadResponse {
    pub fn loaded(model: String) -> Self {
        Self {
            status: "success".to_string(),
            message: format!("Model {model} loaded successfully"),
            model,
        }
    }
}

/// Query of `POST /start`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartQuery {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub status: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableModelsResponse {
    pub models: Vec<InstalledModel>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" once the engine is ready, "starting" otherwise.
    pub status: String,
    pub engine: StatusSnapshot,
}

impl HealthResponse {
    pub fn from_snapshot(engine: StatusSnapshot) -> Self {
        let status = if engine.is_ready() { "healthy" } else { "starting" };
        Self {
            status: status.to_string(),
            engine,
        }
    }
}

/// Body of `GET /ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub state: EngineState,
}
