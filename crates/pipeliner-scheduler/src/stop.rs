//! A once-set-never-cleared stop signal shared between the main loop, the
//! progress poller, and the stdout pump.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for the signal to fire. Returns `true` if it has
    /// fired (immediately, or during the wait); `false` if `timeout` elapsed
    /// first.
    pub async fn wait_for(&self, timeout: Duration) -> bool {
        if self.is_set() {
            return true;
        }
        tokio::select! {
            _ = self.notify.notified() => true,
            _ = tokio::time::sleep(timeout) => self.is_set(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_returns_false_on_timeout_when_unset() {
        let signal = StopSignal::new();
        assert!(!signal.wait_for(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn wait_for_returns_true_immediately_once_fired() {
        let signal = StopSignal::new();
        signal.fire();
        assert!(signal.wait_for(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn fire_wakes_a_pending_wait() {
        let signal = StopSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.wait_for(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.fire();
        assert!(handle.await.unwrap());
    }
}
