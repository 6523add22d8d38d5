//! Engine process ports.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use super::ProcessError;
use crate::config::LaunchSpec;

/// Opaque handle to a running engine process and its process group.
///
/// All methods take `&self` so the handle can be inspected by status
/// readers while the supervisor owns it.
#[async_trait]
pub trait EngineProcessHandle: Send + Sync + Debug {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Whether the process has not exited yet.
    fn is_alive(&self) -> bool;

    /// Ask the whole process group to exit (SIGTERM on Unix).
    ///
    /// A process that is already gone is not an error.
    fn terminate(&self) -> Result<(), ProcessError>;

    /// Force the whole process group down (SIGKILL on Unix).
    ///
    /// A process that is already gone is not an error.
    fn kill(&self) -> Result<(), ProcessError>;

    /// Wait up to `timeout` for the process to exit. Returns `true` if it did.
    async fn wait_exit(&self, timeout: Duration) -> bool;
}

/// Spawns engine processes.
pub trait EngineLauncher: Send + Sync {
    /// Spawn an engine for `spec`, bound to loopback on the internal port.
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn EngineProcessHandle>, ProcessError>;
}
