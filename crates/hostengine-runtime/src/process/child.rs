//! Process-group handle for a spawned engine.
//!
//! The engine is spawned as the leader of its own process group, so
//! termination signals reach any helper processes it forks. A reaper task
//! owns the `tokio::process::Child` and publishes the exit through a watch
//! channel; the handle itself only needs `&self`.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hostengine_core::{EngineProcessHandle, ProcessError};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;

/// Handle to an engine process running in its own process group.
#[derive(Debug)]
pub struct ChildEngineProcess {
    pid: Option<u32>,
    exited: watch::Receiver<bool>,
    /// Asks the reaper to kill the leader directly.
    kill_token: CancellationToken,
}

impl ChildEngineProcess {
    /// Spawn `command` as a new process-group leader.
    ///
    /// Pipes configured on `command` are left on the returned child so the
    /// caller can attach log readers before handing it to [`Self::from_child`].
    pub fn spawn_in_group(command: &mut Command) -> io::Result<Child> {
        #[cfg(unix)]
        command.process_group(0);
        command.kill_on_drop(true).spawn()
    }

    /// Take ownership of `child` and start its reaper task.
    pub fn from_child(mut child: Child) -> Self {
        let pid = child.id();
        let (exited_tx, exited) = watch::channel(false);
        let kill_token = CancellationToken::new();
        let token = kill_token.clone();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                () = token.cancelled() => {
                    if let Err(e) = child.start_kill() {
                        debug!(?pid, error = %e, "Direct kill of engine leader failed");
                    }
                    child.wait().await
                }
            };

            match status {
                Ok(status) => debug!(?pid, %status, "Engine process reaped"),
                Err(e) => warn!(?pid, error = %e, "Failed to reap engine process"),
            }
            exited_tx.send_replace(true);
        });

        Self {
            pid,
            exited,
            kill_token,
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: Signal) -> Result<(), ProcessError> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        let raw = i32::try_from(pid).map_err(|_| ProcessError::Signal {
            pid,
            reason: "pid out of range".to_string(),
        })?;

        match killpg(Pid::from_raw(raw), signal) {
            // The group is already gone.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::Signal {
                pid,
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl EngineProcessHandle for ChildEngineProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&self) -> bool {
        !*self.exited.borrow()
    }

    fn terminate(&self) -> Result<(), ProcessError> {
        if !self.is_alive() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            self.signal_group(Signal::SIGTERM)
        }

        // No graceful signal available; terminate immediately.
        #[cfg(not(unix))]
        {
            self.kill_token.cancel();
            Ok(())
        }
    }

    fn kill(&self) -> Result<(), ProcessError> {
        if !self.is_alive() {
            return Ok(());
        }

        self.kill_token.cancel();
        #[cfg(unix)]
        {
            self.signal_group(Signal::SIGKILL)
        }
        #[cfg(not(unix))]
        {
            Ok(())
        }
    }

    async fn wait_exit(&self, timeout: Duration) -> bool {
        let mut exited = self.exited.clone();
        // A closed channel means the reaper finished, so the process is gone.
        matches!(
            tokio::time::timeout(timeout, exited.wait_for(|done| *done)).await,
            Ok(_)
        )
    }
}

impl Drop for ChildEngineProcess {
    fn drop(&mut self) {
        if self.is_alive() {
            debug!(pid = ?self.pid, "Engine handle dropped while running; killing process group");
            if let Err(e) = self.kill() {
                warn!(pid = ?self.pid, error = %e, "Failed to kill engine on drop");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn spawn(program: &str, args: &[&str]) -> ChildEngineProcess {
        let mut command = Command::new(program);
        command.args(args);
        let child = ChildEngineProcess::spawn_in_group(&mut command).unwrap();
        ChildEngineProcess::from_child(child)
    }

    #[tokio::test]
    async fn terminate_stops_cooperative_process() {
        let handle = spawn("sleep", &["30"]);
        assert!(handle.is_alive());
        assert!(handle.pid().is_some());

        handle.terminate().unwrap();
        assert!(handle.wait_exit(Duration::from_secs(5)).await);
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn kill_stops_process_ignoring_sigterm() {
        // Ignored dispositions are inherited, so `sleep` ignores SIGTERM too.
        let handle = spawn("sh", &["-c", "trap '' TERM; sleep 30"]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        handle.terminate().unwrap();
        assert!(!handle.wait_exit(Duration::from_millis(300)).await);
        assert!(handle.is_alive());

        handle.kill().unwrap();
        assert!(handle.wait_exit(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn signals_after_exit_are_noops() {
        let handle = spawn("true", &[]);
        assert!(handle.wait_exit(Duration::from_secs(5)).await);

        handle.terminate().unwrap();
        handle.kill().unwrap();
        assert!(!handle.is_alive());
    }
}
