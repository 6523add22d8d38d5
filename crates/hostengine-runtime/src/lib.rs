//! Engine process supervision for hostengine.
//!
//! - [`EngineSupervisor`] owns the engine process: start, stop, hot-swap,
//!   startup health gating and background crash recovery.
//! - [`CrashRecoveryPolicy`] decides whether and when to restart.
//! - [`HttpHealthProber`] performs single readiness checks.
//! - [`StatusReporter`] derives read-only status snapshots.
//! - [`process`] holds the OS-facing pieces (child handle, launcher, log readers).
#![deny(unsafe_code)]

mod health;
mod monitor;
pub mod process;
mod recovery;
mod status;
mod supervisor;

pub use health::{HttpHealthProber, READINESS_PATH};
pub use monitor::MonitoringFlag;
pub use process::{ChildEngineProcess, CommandLauncher};
pub use recovery::{CrashRecoveryPolicy, RecoveryDecision};
pub use status::StatusReporter;
pub use supervisor::{EngineSupervisor, SupervisorError};
