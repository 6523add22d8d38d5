//! In-memory fakes of the process and health ports.
//!
//! Enabled with the `test-utils` feature. The fakes never touch the OS, so
//! supervisor tests can run on tokio's paused clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::LaunchSpec;
use crate::ports::{EngineLauncher, EngineProcessHandle, HealthProbe, ProcessError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a fake process behaves once launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    /// Stays alive until terminated or killed.
    StayAlive,
    /// Is already dead when the launcher returns.
    ExitImmediately,
    /// Ignores graceful termination; only force-kill stops it.
    IgnoreTerminate,
}

/// Shared control block of one fake process.
#[derive(Debug)]
pub struct FakeProcessControl {
    pid: u32,
    alive: watch::Sender<bool>,
    ignores_terminate: bool,
    terminate_requests: AtomicUsize,
    kill_requests: AtomicUsize,
}

impl FakeProcessControl {
    fn new(pid: u32, behavior: FakeBehavior) -> Self {
        let (alive, _) = watch::channel(behavior != FakeBehavior::ExitImmediately);
        Self {
            pid,
            alive,
            ignores_terminate: behavior == FakeBehavior::IgnoreTerminate,
            terminate_requests: AtomicUsize::new(0),
            kill_requests: AtomicUsize::new(0),
        }
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    /// Simulate the process dying on its own.
    pub fn crash(&self) {
        self.alive.send_replace(false);
    }

    pub fn terminate_requests(&self) -> usize {
        self.terminate_requests.load(Ordering::SeqCst)
    }

    pub fn kill_requests(&self) -> usize {
        self.kill_requests.load(Ordering::SeqCst)
    }
}

/// Fake process handle backed by a [`FakeProcessControl`].
#[derive(Debug)]
pub struct FakeProcess {
    control: Arc<FakeProcessControl>,
}

#[async_trait]
impl EngineProcessHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.control.pid)
    }

    fn is_alive(&self) -> bool {
        self.control.is_alive()
    }

    fn terminate(&self) -> Result<(), ProcessError> {
        self.control.terminate_requests.fetch_add(1, Ordering::SeqCst);
        if !self.control.ignores_terminate {
            self.control.alive.send_replace(false);
        }
        Ok(())
    }

    fn kill(&self) -> Result<(), ProcessError> {
        self.control.kill_requests.fetch_add(1, Ordering::SeqCst);
        self.control.alive.send_replace(false);
        Ok(())
    }

    async fn wait_exit(&self, timeout: Duration) -> bool {
        let mut rx = self.control.alive.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|alive| !*alive)).await,
            Ok(Ok(_))
        )
    }
}

/// A recorded call to [`FakeLauncher::launch`].
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub spec: LaunchSpec,
    pub at: Instant,
}

/// Launcher that hands out [`FakeProcess`]es.
///
/// Behaviours queued with [`push_behavior`](Self::push_behavior) are used
/// first, in order; afterwards every launch uses the default behaviour.
#[derive(Debug)]
pub struct FakeLauncher {
    default_behavior: Mutex<FakeBehavior>,
    queued: Mutex<VecDeque<FakeBehavior>>,
    launches: Mutex<Vec<LaunchRecord>>,
    processes: Mutex<Vec<Arc<FakeProcessControl>>>,
    fail_spawn: AtomicBool,
    next_pid: AtomicU32,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new(FakeBehavior::StayAlive)
    }
}

impl FakeLauncher {
    pub fn new(default_behavior: FakeBehavior) -> Self {
        Self {
            default_behavior: Mutex::new(default_behavior),
            queued: Mutex::new(VecDeque::new()),
            launches: Mutex::new(Vec::new()),
            processes: Mutex::new(Vec::new()),
            fail_spawn: AtomicBool::new(false),
            next_pid: AtomicU32::new(4000),
        }
    }

    /// Use `behavior` for the next launch only.
    pub fn push_behavior(&self, behavior: FakeBehavior) {
        lock(&self.queued).push_back(behavior);
    }

    /// Change the behaviour used once the queue is empty.
    pub fn set_default_behavior(&self, behavior: FakeBehavior) {
        *lock(&self.default_behavior) = behavior;
    }

    /// Make every subsequent launch fail to spawn.
    pub fn fail_spawns(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn launch_count(&self) -> usize {
        lock(&self.launches).len()
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        lock(&self.launches).clone()
    }

    /// Control block of the most recently launched process.
    pub fn last_process(&self) -> Option<Arc<FakeProcessControl>> {
        lock(&self.processes).last().cloned()
    }

    /// Number of launched processes that are still alive.
    pub fn alive_count(&self) -> usize {
        lock(&self.processes)
            .iter()
            .filter(|p| p.is_alive())
            .count()
    }
}

impl EngineLauncher for FakeLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn EngineProcessHandle>, ProcessError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(ProcessError::Spawn {
                program: "fake-engine".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }

        let behavior = lock(&self.queued)
            .pop_front()
            .unwrap_or_else(|| *lock(&self.default_behavior));
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let control = Arc::new(FakeProcessControl::new(pid, behavior));

        lock(&self.launches).push(LaunchRecord {
            spec: spec.clone(),
            at: Instant::now(),
        });
        lock(&self.processes).push(Arc::clone(&control));

        Ok(Box::new(FakeProcess { control }))
    }
}

/// Health probe that replays a script of answers.
///
/// The last answer repeats once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    last: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    /// Probe that always gives the same answer.
    pub fn always(healthy: bool) -> Self {
        Self::sequence([healthy])
    }

    /// Probe that answers `answers` in order, then repeats the last one.
    pub fn sequence(answers: impl IntoIterator<Item = bool>) -> Self {
        let script: VecDeque<bool> = answers.into_iter().collect();
        let last = script.back().copied().unwrap_or(false);
        Self {
            script: Mutex::new(script),
            last: AtomicBool::new(last),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the remaining script with a constant answer.
    pub fn set(&self, healthy: bool) {
        lock(&self.script).clear();
        self.last.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn is_healthy(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.last.load(Ordering::SeqCst))
    }
}
