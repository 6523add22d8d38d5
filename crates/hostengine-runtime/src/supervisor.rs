//! Engine supervisor: owns the engine process and its lifecycle.
//!
//! The `EngineSupervisor` owns all process state internally. Adapters
//! (Axum, CLI) call methods on it without holding handles themselves.
//!
//! Key design decisions:
//! - **Two locks**: `operations` serializes public start/stop/swap calls;
//!   `lifecycle` serializes everything that spawns, signals or reaps the
//!   process, including recovery driven by the monitor. The monitor only
//!   ever `try_lock`s, so it never queues behind a user operation.
//! - **Short critical sections**: process state lives behind a std mutex
//!   that is never held across an await.
//! - **Stop preempts recovery**: the monitoring flag is cleared before the
//!   lifecycle lock is taken, which wakes any pending restart backoff and
//!   ends any startup health poll.
//! - **One monitor task**: the task is tagged with a generation number and
//!   holds only a `Weak` reference to the supervisor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use hostengine_core::{
    EngineConfig, EngineLauncher, EngineProcessHandle, EngineState, HealthProbe, LaunchSpec,
    ProcessError, SupervisorTimings,
};

use crate::monitor::MonitoringFlag;
use crate::recovery::{CrashRecoveryPolicy, RecoveryDecision};

/// Error from supervisor operations.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The engine process could not be spawned.
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[from] ProcessError),

    /// The engine never passed a readiness check.
    #[error("Engine failed to become healthy after {attempts} health checks")]
    StartupTimedOut { attempts: u32 },

    /// The engine kept exiting and the restart budget is spent.
    #[error("Engine exited repeatedly; gave up after {attempts} restart attempts")]
    RetriesExhausted { attempts: u32 },

    /// A startup or pending restart was cancelled by a stop.
    #[error("Engine start cancelled")]
    Cancelled,
}

/// The engine instance currently owned by the supervisor.
#[derive(Debug)]
pub(crate) struct EngineProcess {
    pub(crate) handle: Box<dyn EngineProcessHandle>,
    pub(crate) spec: LaunchSpec,
    pub(crate) started_at: Instant,
    pub(crate) started_wall: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct SupervisorState {
    pub(crate) process: Option<EngineProcess>,
    pub(crate) phase: EngineState,
    pub(crate) recovery: CrashRecoveryPolicy,
}

struct MonitorTask {
    generation: u64,
    handle: JoinHandle<()>,
}

enum LaunchOutcome {
    Healthy,
    Exited,
    TimedOut,
    Cancelled,
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Supervisor for the engine process.
///
/// # Example
///
/// ```ignore
/// let supervisor = Arc::new(EngineSupervisor::new(config, launcher, prober));
/// supervisor.start(None).await?;
/// supervisor.swap("mlx-community/Other-4bit".into(), None).await?;
/// supervisor.stop().await;
/// ```
pub struct EngineSupervisor {
    config: Arc<EngineConfig>,
    launcher: Arc<dyn EngineLauncher>,
    prober: Arc<dyn HealthProbe>,
    operations: Mutex<()>,
    lifecycle: Mutex<()>,
    state: StdMutex<SupervisorState>,
    monitoring: MonitoringFlag,
    monitor: StdMutex<Option<MonitorTask>>,
    monitor_generation: AtomicU64,
}

impl EngineSupervisor {
    pub fn new(
        config: Arc<EngineConfig>,
        launcher: Arc<dyn EngineLauncher>,
        prober: Arc<dyn HealthProbe>,
    ) -> Self {
        let recovery = CrashRecoveryPolicy::from_timings(&config.timings);
        Self {
            config,
            launcher,
            prober,
            operations: Mutex::new(()),
            lifecycle: Mutex::new(()),
            state: StdMutex::new(SupervisorState {
                process: None,
                phase: EngineState::Stopped,
                recovery,
            }),
            monitoring: MonitoringFlag::new(),
            monitor: StdMutex::new(None),
            monitor_generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn timings(&self) -> &SupervisorTimings {
        &self.config.timings
    }

    /// Model of the current engine process, if any.
    pub fn current_model(&self) -> Option<String> {
        lock(&self.state)
            .process
            .as_ref()
            .map(|p| p.spec.model_id.clone())
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&SupervisorState) -> R) -> R {
        f(&lock(&self.state))
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Start the engine with `model`, or the configured default.
    ///
    /// A no-op when an engine process is already alive, whatever model it
    /// serves. On success background monitoring is (re)armed.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot be spawned, never becomes healthy, or
    /// keeps exiting until the restart budget is spent.
    pub async fn start(self: &Arc<Self>, model: Option<String>) -> Result<(), SupervisorError> {
        let spec = self.config.launch_spec(model);
        let _op = self.operations.lock().await;
        self.start_inner(spec).await
    }

    /// Stop the engine and disable monitoring.
    ///
    /// Always completes: SIGTERM to the process group, then SIGKILL after the
    /// grace period. Also cancels a pending restart. Idempotent.
    pub async fn stop(&self) {
        // Cleared before queueing so a start stuck in backoff gives way.
        self.stop_monitoring();
        let _op = self.operations.lock().await;
        self.stop_inner().await;
    }

    /// Replace the running model: stop, drain, start.
    ///
    /// `max_tokens` overrides the configured limit for the new process.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start). The old engine is already stopped
    /// when the new one fails.
    pub async fn swap(
        self: &Arc<Self>,
        model: String,
        max_tokens: Option<u32>,
    ) -> Result<(), SupervisorError> {
        let spec = LaunchSpec::new(model, max_tokens.unwrap_or(self.config.max_tokens));
        let _op = self.operations.lock().await;

        info!(
            from = ?self.current_model(),
            to = %spec.model_id,
            max_tokens = spec.max_tokens,
            "Hot-swapping engine model"
        );
        self.stop_inner().await;
        tokio::time::sleep(self.timings().drain_delay).await;
        self.start_inner(spec).await
    }

    /// Arm background crash detection.
    ///
    /// Returns `false` when a monitor task is already running; it keeps
    /// running and sees the raised flag.
    pub fn start_monitoring(self: &Arc<Self>) -> bool {
        let mut slot = lock(&self.monitor);
        self.monitoring.raise();

        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return false;
        }

        let generation = self.monitor_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = tokio::spawn(run_monitor(
            Arc::downgrade(self),
            self.monitoring.clone(),
            self.timings().monitor_interval,
            generation,
        ));
        *slot = Some(MonitorTask { generation, handle });

        info!(
            interval_secs = self.timings().monitor_interval.as_secs(),
            "Engine monitoring started"
        );
        true
    }

    /// Disable background crash detection. Wakes a pending restart backoff
    /// and cancels a startup that is still waiting for readiness.
    pub fn stop_monitoring(&self) {
        if self.monitoring.is_set() {
            debug!("Engine monitoring disabled");
        }
        self.monitoring.clear();
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.is_set()
    }

    // =========================================================================
    // Lifecycle internals (callers hold `operations`)
    // =========================================================================

    async fn start_inner(self: &Arc<Self>, spec: LaunchSpec) -> Result<(), SupervisorError> {
        self.monitoring.raise();

        let result = {
            let _guard = self.lifecycle.lock().await;
            if self.process_alive() {
                debug!(model = ?self.current_model(), "Engine already running; start is a no-op");
                Ok(())
            } else {
                self.launch_until_healthy(spec).await
            }
        };

        if result.is_ok() {
            self.start_monitoring();
        }
        result
    }

    async fn stop_inner(&self) {
        self.stop_monitoring();
        {
            let _guard = self.lifecycle.lock().await;
            self.teardown().await;
        }
        self.join_monitor().await;
    }

    /// Wait for the monitor task to notice the cleared flag.
    async fn join_monitor(&self) {
        let Some(task) = lock(&self.monitor).take() else {
            return;
        };

        let mut join = task.handle;
        match tokio::time::timeout(self.timings().grace_timeout, &mut join).await {
            Ok(Ok(())) => debug!(generation = task.generation, "Monitor task finished"),
            Ok(Err(e)) => warn!(generation = task.generation, error = %e, "Monitor task panicked"),
            Err(_) => {
                warn!(generation = task.generation, "Monitor task did not stop in time; aborting");
                join.abort();
            }
        }
    }

    // =========================================================================
    // Process internals (callers hold `lifecycle`)
    // =========================================================================

    /// Launch and health-gate, restarting with backoff when the process
    /// exits during startup.
    async fn launch_until_healthy(&self, spec: LaunchSpec) -> Result<(), SupervisorError> {
        loop {
            match self.launch_once(&spec).await? {
                LaunchOutcome::Healthy => {
                    self.mark_running();
                    return Ok(());
                }
                LaunchOutcome::TimedOut => {
                    let attempts = self.timings().startup_attempts;
                    error!(
                        model = %spec.model_id,
                        attempts,
                        "Engine failed to become healthy; stopping it"
                    );
                    self.teardown().await;
                    return Err(SupervisorError::StartupTimedOut { attempts });
                }
                LaunchOutcome::Exited => {
                    self.take_process(EngineState::Crashed);
                    self.recover_after_exit(&spec).await?;
                }
                LaunchOutcome::Cancelled => {
                    info!(model = %spec.model_id, "Engine startup cancelled by stop");
                    self.teardown().await;
                    return Err(SupervisorError::Cancelled);
                }
            }
        }
    }

    async fn launch_once(&self, spec: &LaunchSpec) -> Result<LaunchOutcome, SupervisorError> {
        let timings = self.timings();
        self.set_phase(EngineState::Starting);
        info!(
            model = %spec.model_id,
            max_tokens = spec.max_tokens,
            port = self.config.internal_port,
            "Starting engine"
        );

        let handle = match self.launcher.launch(spec) {
            Ok(handle) => handle,
            Err(e) => {
                error!(model = %spec.model_id, error = %e, "Failed to spawn engine");
                self.set_phase(EngineState::Stopped);
                return Err(SupervisorError::Spawn(e));
            }
        };
        self.install_process(handle, spec.clone());

        // The poll yields to a cleared monitoring flag so `stop` never waits
        // out a full startup.
        for attempt in 1..=timings.startup_attempts {
            if !self.monitoring.is_set() {
                return Ok(LaunchOutcome::Cancelled);
            }
            if !self.process_alive() {
                warn!(model = %spec.model_id, attempt, "Engine exited during startup");
                return Ok(LaunchOutcome::Exited);
            }
            if self.prober.is_healthy().await {
                info!(model = %spec.model_id, attempt, "Engine is ready");
                return Ok(LaunchOutcome::Healthy);
            }
            debug!(model = %spec.model_id, attempt, "Engine not ready yet");
            if attempt < timings.startup_attempts
                && !self.monitoring.sleep(timings.startup_poll_interval).await
            {
                return Ok(LaunchOutcome::Cancelled);
            }
        }
        Ok(LaunchOutcome::TimedOut)
    }

    /// Consult the recovery policy after an unexpected exit and wait out
    /// the backoff. `Ok` means "relaunch now".
    async fn recover_after_exit(&self, spec: &LaunchSpec) -> Result<(), SupervisorError> {
        match self.record_unexpected_exit() {
            RecoveryDecision::Exhausted { attempts } => {
                error!(
                    model = %spec.model_id,
                    attempts,
                    "Engine keeps exiting; giving up until the next explicit start"
                );
                self.set_phase(EngineState::Stopped);
                Err(SupervisorError::RetriesExhausted { attempts })
            }
            RecoveryDecision::Retry { attempt, backoff } => {
                warn!(
                    model = %spec.model_id,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    "Restarting engine after backoff"
                );
                if self.monitoring.sleep(backoff).await {
                    Ok(())
                } else {
                    info!(model = %spec.model_id, "Pending engine restart cancelled");
                    self.set_phase(EngineState::Stopped);
                    Err(SupervisorError::Cancelled)
                }
            }
        }
    }

    /// Terminate the current process, escalating to kill after the grace
    /// period. Process state is cleared unconditionally.
    async fn teardown(&self) {
        let Some(process) = self.take_process(EngineState::Stopping) else {
            self.set_phase(EngineState::Stopped);
            return;
        };
        let timings = self.timings();
        let pid = process.handle.pid();
        info!(model = %process.spec.model_id, ?pid, "Stopping engine");

        if let Err(e) = process.handle.terminate() {
            warn!(?pid, error = %e, "Failed to send termination signal");
        }
        if !process.handle.wait_exit(timings.grace_timeout).await {
            warn!(
                ?pid,
                grace_secs = timings.grace_timeout.as_secs(),
                "Engine ignored termination; force-killing"
            );
            if let Err(e) = process.handle.kill() {
                warn!(?pid, error = %e, "Failed to force-kill engine");
            }
            if !process.handle.wait_exit(timings.kill_timeout).await {
                error!(?pid, "Engine still not reaped after force-kill");
            }
        }

        self.set_phase(EngineState::Stopped);
        info!(model = %process.spec.model_id, "Engine stopped");
    }

    // =========================================================================
    // Monitor internals
    // =========================================================================

    /// One liveness check. Skipped while a lifecycle operation is running.
    async fn check_engine(&self) {
        let Ok(_guard) = self.lifecycle.try_lock() else {
            debug!("Lifecycle operation in progress; skipping liveness check");
            return;
        };
        if !self.monitoring.is_set() {
            return;
        }
        let Some(spec) = self.take_dead_process() else {
            return;
        };

        error!(model = %spec.model_id, "Engine process exited unexpectedly");
        let result = match self.recover_after_exit(&spec).await {
            Ok(()) => self.launch_until_healthy(spec.clone()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => info!(model = %spec.model_id, "Engine recovered"),
            Err(SupervisorError::Cancelled) => debug!("Engine recovery cancelled"),
            Err(e) => error!(model = %spec.model_id, error = %e, "Engine recovery failed"),
        }
    }

    /// Called by the monitor task when the flag is clear. Returns `true`
    /// when the task should exit.
    fn retire_monitor(&self, generation: u64) -> bool {
        let mut slot = lock(&self.monitor);
        match slot.as_ref() {
            Some(task) if task.generation == generation => {
                if self.monitoring.is_set() {
                    return false;
                }
                *slot = None;
                true
            }
            // Superseded or already taken by `stop`.
            _ => true,
        }
    }

    // =========================================================================
    // State helpers (never await while holding `state`)
    // =========================================================================

    fn process_alive(&self) -> bool {
        lock(&self.state)
            .process
            .as_ref()
            .is_some_and(|p| p.handle.is_alive())
    }

    fn set_phase(&self, phase: EngineState) {
        lock(&self.state).phase = phase;
    }

    fn install_process(&self, handle: Box<dyn EngineProcessHandle>, spec: LaunchSpec) {
        lock(&self.state).process = Some(EngineProcess {
            handle,
            spec,
            started_at: Instant::now(),
            started_wall: Utc::now(),
        });
    }

    fn take_process(&self, phase: EngineState) -> Option<EngineProcess> {
        let mut state = lock(&self.state);
        state.phase = phase;
        state.process.take()
    }

    fn take_dead_process(&self) -> Option<LaunchSpec> {
        let mut state = lock(&self.state);
        if state.process.as_ref()?.handle.is_alive() {
            return None;
        }
        state.phase = EngineState::Crashed;
        state.process.take().map(|p| p.spec)
    }

    fn mark_running(&self) {
        let mut state = lock(&self.state);
        state.recovery.reset();
        state.phase = EngineState::Running;
    }

    fn record_unexpected_exit(&self) -> RecoveryDecision {
        let mut state = lock(&self.state);
        state.phase = EngineState::Crashed;
        state.recovery.on_unexpected_exit()
    }
}

impl Drop for EngineSupervisor {
    fn drop(&mut self) {
        self.monitoring.clear();
        if let Some(task) = lock(&self.monitor).take() {
            task.handle.abort();
        }
    }
}

/// Background liveness loop.
async fn run_monitor(
    supervisor: Weak<EngineSupervisor>,
    flag: MonitoringFlag,
    interval: Duration,
    generation: u64,
) {
    debug!(generation, "Monitor task started");
    loop {
        let slept = flag.sleep(interval).await;
        let Some(supervisor) = supervisor.upgrade() else {
            break;
        };
        if !slept {
            if supervisor.retire_monitor(generation) {
                break;
            }
            continue;
        }
        supervisor.check_engine().await;
    }
    debug!(generation, "Monitor task exiting");
}
