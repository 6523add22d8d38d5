//! HTTP surface of hostengine: management endpoints for the engine
//! supervisor plus the OpenAI-compatible proxy routes.
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export primary types
pub use bootstrap::{AxumContext, CorsConfig, bootstrap, bootstrap_with, serve, start_server};
pub use error::HttpError;
pub use routes::create_router;
pub use state::AppState;
