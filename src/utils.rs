use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Yields once to the scheduler, like waiting on a zero-delay timer.
pub async fn next_tick() {
    tokio::task::yield_now().await;
}

/// Coalesces a burst of values into the last one, released after a quiet window.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: None }
    }

    /// Replaces any pending value and restarts the window.
    pub fn push(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.window));
    }

    /// Waits for the window to elapse, then hands out the latest value.
    ///
    /// Never resolves while nothing is pending. Cancel safe: dropping the future keeps the
    /// pending value.
    pub async fn ready(&mut self) -> T {
        loop {
            let deadline = match &self.pending {
                Some((_, deadline)) => *deadline,
                None => std::future::pending().await,
            };
            sleep_until(deadline).await;
            if let Some((value, _)) = self.pending.take() {
                return value;
            }
        }
    }
}
