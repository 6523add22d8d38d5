//! Domain types shared by the runtime and the HTTP adapter.

mod models;
mod status;

pub use models::{InstalledModel, MODEL_DESCRIPTOR, scan_model_directory};
pub use status::{EngineState, StatusSnapshot};
