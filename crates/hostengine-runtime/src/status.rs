//! Read-only status derivation.

use std::sync::Arc;

use tokio::time::Instant;

use hostengine_core::{EngineState, StatusSnapshot};

use crate::supervisor::{EngineSupervisor, SupervisorState};

/// Builds [`StatusSnapshot`]s from the supervisor's current state.
#[derive(Clone)]
pub struct StatusReporter {
    supervisor: Arc<EngineSupervisor>,
}

impl StatusReporter {
    pub const fn new(supervisor: Arc<EngineSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Point-in-time view of the engine. Never blocks on lifecycle work.
    pub fn snapshot(&self) -> StatusSnapshot {
        let port = self.supervisor.config().port;
        self.supervisor
            .with_state(|state| derive_snapshot(state, port, Instant::now()))
    }

    /// Whether the engine is running and its process alive.
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ready()
    }
}

fn derive_snapshot(state: &SupervisorState, port: u16, now: Instant) -> StatusSnapshot {
    let restart_attempts = state.recovery.attempt_count();
    let Some(process) = &state.process else {
        return StatusSnapshot {
            state: state.phase,
            ..StatusSnapshot::stopped(port, restart_attempts)
        };
    };

    let alive = process.handle.is_alive();
    // A dead process the monitor has not collected yet.
    let phase = if !alive && state.phase.expects_process() {
        EngineState::Crashed
    } else {
        state.phase
    };

    StatusSnapshot {
        state: phase,
        engine_running: alive && phase == EngineState::Running,
        model_id: Some(process.spec.model_id.clone()),
        uptime_seconds: now.saturating_duration_since(process.started_at).as_secs_f64(),
        restart_attempts,
        port,
        pid: process.handle.pid(),
        started_at: Some(process.started_wall),
    }
}
