//! OS-facing process management for the engine.
//!
//! - [`CommandLauncher`] builds the engine command line and spawns it in its
//!   own process group.
//! - [`ChildEngineProcess`] is the handle the supervisor keeps: signals go to
//!   the whole group, and a reaper task records the exit.
//! - `stream` forwards engine stdout/stderr into tracing.

mod child;
mod launcher;
mod stream;

pub use child::ChildEngineProcess;
pub use launcher::CommandLauncher;
pub use stream::{ENGINE_LOG_TARGET, spawn_stream_reader};
