//! The "monitoring enabled" flag shared by the supervisor and its monitor task.
//!
//! Clearing the flag wakes every waiter immediately, which is how a stop
//! preempts a pending restart backoff.

use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct MonitoringFlag {
    tx: watch::Sender<bool>,
}

impl Default for MonitoringFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringFlag {
    /// A cleared flag.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is cleared.
    pub async fn cleared(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|set| !*set).await;
    }

    /// Sleep for `duration` unless the flag is cleared first.
    ///
    /// Returns `false` when the sleep was cut short (or the flag was
    /// already clear).
    pub async fn sleep(&self, duration: Duration) -> bool {
        if !self.is_set() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => self.is_set(),
            () = self.cleared() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn sleep_runs_to_completion_while_raised() {
        let flag = MonitoringFlag::new();
        flag.raise();

        let started = Instant::now();
        assert!(flag.sleep(Duration::from_secs(4)).await);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_interrupts_sleep() {
        let flag = Arc::new(MonitoringFlag::new());
        flag.raise();

        let sleeper = {
            let flag = Arc::clone(&flag);
            tokio::spawn(async move { flag.sleep(Duration::from_secs(60)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        flag.clear();

        let started = Instant::now();
        assert!(!sleeper.await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cleared_waits_for_the_flag_to_drop() {
        let flag = MonitoringFlag::new();
        flag.raise();

        let mut waiter = tokio_test::task::spawn(flag.cleared());
        tokio_test::assert_pending!(waiter.poll());

        flag.raise();
        tokio_test::assert_pending!(waiter.poll());

        flag.clear();
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn cleared_flag_does_not_sleep() {
        let flag = MonitoringFlag::new();
        assert!(!flag.is_set());
        assert!(!flag.sleep(Duration::from_secs(3600)).await);
    }
}
