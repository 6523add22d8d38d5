//! Engine status model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of the supervised engine.
///
/// `Crashed` covers both an observed unexpected exit and a pending
/// restart backoff. Exhausted recovery lands back in `Stopped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
}

impl EngineState {
    /// Whether this phase has a process that is expected to be alive.
    pub const fn expects_process(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Crashed => "crashed",
        };
        f.write_str(name)
    }
}

/// Immutable point-in-time view of the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: EngineState,
    /// True only when the engine is confirmed running and its process alive.
    pub engine_running: bool,
    pub model_id: Option<String>,
    pub uptime_seconds: f64,
    pub restart_attempts: u32,
    /// External port of the management server.
    pub port: u16,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Snapshot of a supervisor with nothing running.
    pub const fn stopped(port: u16, restart_attempts: u32) -> Self {
        Self {
            state: EngineState::Stopped,
            engine_running: false,
            model_id: None,
            uptime_seconds: 0.0,
            restart_attempts,
            port,
            pid: None,
            started_at: None,
        }
    }

    /// Whether traffic can be routed to the engine.
    pub const fn is_ready(&self) -> bool {
        self.engine_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&EngineState::Crashed).unwrap();
        assert_eq!(json, "\"crashed\"");
        assert_eq!(EngineState::Starting.to_string(), "starting");
    }

    #[test]
    fn stopped_snapshot_is_not_ready() {
        let snapshot = StatusSnapshot::stopped(8081, 0);
        assert!(!snapshot.is_ready());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["model_id"], serde_json::Value::Null);
        assert_eq!(json["port"], 8081);
    }
}
