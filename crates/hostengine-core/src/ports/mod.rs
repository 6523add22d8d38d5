//! Port definitions for the engine process and its readiness check.
//!
//! The supervisor in `hostengine-runtime` is written against these traits
//! only. Production implementations spawn real child processes and issue
//! real HTTP probes; the `test-utils` feature ships in-memory fakes.

mod health;
mod process;

pub use health::HealthProbe;
pub use process::{EngineLauncher, EngineProcessHandle};

use thiserror::Error;

/// Errors from spawning or signalling an engine process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The engine process could not be spawned.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Delivering a signal to the process group failed.
    #[error("Failed to signal process group {pid}: {reason}")]
    Signal { pid: u32, reason: String },
}
