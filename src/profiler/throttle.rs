//! Per-worker rolling one-second throttle.
//!
//! Every worker owns one [`ThrottleWindow`]. A window opens at the first
//! admission after the previous window expired and admits at most
//! `max_ops` cycles; the next caller waits for the window to close.
//!
//! The cap is per worker. A pool of N workers each capped at Q ops/s can
//! start up to N * Q cycles per second in aggregate.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Length of one throttle window.
pub const WINDOW: Duration = Duration::from_secs(1);

/// Result of asking the throttle for permission to start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The cycle may start now; it has been counted against the window.
    Admitted,
    /// The window is full; retry at the given instant.
    WaitUntil(Instant),
}

/// Rolling window admission counter owned by a single worker.
#[derive(Debug, Clone)]
pub struct ThrottleWindow {
    max_ops: u32,
    window_start: Instant,
    count: u32,
}

impl ThrottleWindow {
    /// Create a throttle whose first window starts at `now`.
    pub fn new(max_ops: u32, now: Instant) -> Self {
        Self {
            max_ops: max_ops.max(1),
            window_start: now,
            count: 0,
        }
    }

    /// Admissions granted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Start of the current window.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Try to admit one cycle at `now`.
    pub fn try_admit(&mut self, now: Instant) -> Admission {
        if now.saturating_duration_since(self.window_start) >= WINDOW {
            self.count = 0;
            self.window_start = now;
        }
        if self.count >= self.max_ops {
            return Admission::WaitUntil(self.window_start + WINDOW);
        }
        self.count += 1;
        Admission::Admitted
    }

    /// Wait until a cycle is admitted.
    ///
    /// Returns `false` without admitting if `cancel` fires while waiting.
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            match self.try_admit(Instant::now()) {
                Admission::Admitted => return true,
                Admission::WaitUntil(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = cancel.cancelled() => return false,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_exactly_max_ops_per_window() {
        let start = Instant::now();
        let mut throttle = ThrottleWindow::new(3, start);

        for _ in 0..3 {
            assert_eq!(throttle.try_admit(start), Admission::Admitted);
        }
        assert_eq!(
            throttle.try_admit(start + Duration::from_millis(10)),
            Admission::WaitUntil(start + WINDOW)
        );
        assert_eq!(throttle.count(), 3);
    }

    #[test]
    fn test_window_resets_after_one_second() {
        let start = Instant::now();
        let mut throttle = ThrottleWindow::new(1, start);

        assert_eq!(throttle.try_admit(start), Admission::Admitted);
        assert!(matches!(
            throttle.try_admit(start + Duration::from_millis(999)),
            Admission::WaitUntil(_)
        ));

        let next = start + WINDOW;
        assert_eq!(throttle.try_admit(next), Admission::Admitted);
        assert_eq!(throttle.window_start(), next);
        assert_eq!(throttle.count(), 1);
    }

    #[test]
    fn test_zero_rate_is_clamped_to_one() {
        let start = Instant::now();
        let mut throttle = ThrottleWindow::new(0, start);
        assert_eq!(throttle.try_admit(start), Admission::Admitted);
        assert!(matches!(throttle.try_admit(start), Admission::WaitUntil(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_defers_extra_op_to_next_window() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut throttle = ThrottleWindow::new(2, start);

        assert!(throttle.acquire(&cancel).await);
        assert!(throttle.acquire(&cancel).await);
        assert_eq!(Instant::now(), start, "first two admissions do not wait");

        assert!(throttle.acquire(&cancel).await);
        assert!(
            Instant::now() >= start + WINDOW,
            "third admission waits for the next window"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_respects_cancellation() {
        let cancel = CancellationToken::new();
        let mut throttle = ThrottleWindow::new(1, Instant::now());
        assert!(throttle.acquire(&cancel).await);

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        assert!(!throttle.acquire(&cancel).await);
        assert_eq!(throttle.count(), 1);
    }
}
