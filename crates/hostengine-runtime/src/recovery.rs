//! Crash recovery policy.
//!
//! Pure bookkeeping: the supervisor reports unexpected exits and the policy
//! answers whether to restart and after how long. Backoff grows as
//! `base^attempt` seconds (2s, 4s, 8s with the defaults).

use std::time::Duration;

use hostengine_core::SupervisorTimings;

/// Restart bookkeeping; only the attempt count reaches status snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RestartState {
    /// Restarts attempted since the last confirmed healthy start.
    attempt_count: u32,
    max_attempts: u32,
    /// Base of the exponential backoff, in seconds.
    backoff_base: u32,
}

/// What to do after an unexpected exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Restart after `backoff`; this is restart number `attempt`.
    Retry { attempt: u32, backoff: Duration },
    /// The budget is spent. The counter has been reset.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct CrashRecoveryPolicy {
    state: RestartState,
}

impl CrashRecoveryPolicy {
    pub const fn new(max_attempts: u32, backoff_base: u32) -> Self {
        Self {
            state: RestartState {
                attempt_count: 0,
                max_attempts,
                backoff_base,
            },
        }
    }

    pub const fn from_timings(timings: &SupervisorTimings) -> Self {
        Self::new(timings.max_restart_attempts, timings.backoff_base)
    }

    /// Record an unexpected exit and decide whether to restart.
    pub fn on_unexpected_exit(&mut self) -> RecoveryDecision {
        let next = self.state.attempt_count.saturating_add(1);
        if next > self.state.max_attempts {
            self.reset();
            return RecoveryDecision::Exhausted {
                attempts: self.state.max_attempts,
            };
        }

        self.state.attempt_count = next;
        RecoveryDecision::Retry {
            attempt: next,
            backoff: self.backoff_for(next),
        }
    }

    /// Forget previous failures after a confirmed healthy start.
    pub const fn reset(&mut self) {
        self.state.attempt_count = 0;
    }

    pub const fn attempt_count(&self) -> u32 {
        self.state.attempt_count
    }

    /// Delay before restart number `attempt`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_secs(u64::from(self.state.backoff_base).saturating_pow(attempt))
    }
}
