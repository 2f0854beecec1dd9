//! Idle shutdown timer for the worker.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Default interval without requests after which a worker exits.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Deadline that moves forward on every [`IdleTimer::reset`].
#[derive(Debug)]
pub struct IdleTimer {
    origin: Instant,
    interval: Duration,
    // Milliseconds since `origin`.
    deadline: AtomicU64,
}

impl IdleTimer {
    /// Start a timer expiring `interval` from now.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        let timer = IdleTimer {
            origin: Instant::now(),
            interval,
            deadline: AtomicU64::new(0),
        };
        timer.reset();
        timer
    }

    /// The configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Push the deadline to `interval` from now.
    pub fn reset(&self) {
        let deadline = self.origin.elapsed().saturating_add(self.interval);
        self.deadline.store(millis(deadline), Ordering::Release);
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let deadline = Duration::from_millis(self.deadline.load(Ordering::Acquire));
        deadline.saturating_sub(self.origin.elapsed())
    }

    /// `true` once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Sleep until the deadline, following resets made meanwhile.
    pub async fn expired(&self) {
        loop {
            let remaining = self.remaining();
            if remaining.is_zero() {
                return;
            }
            tokio::time::sleep(remaining).await;
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_extends() {
        let timer = IdleTimer::new(Duration::from_secs(60));
        assert!(!timer.is_expired());
        assert!(timer.remaining() > Duration::from_secs(59));

        let expired = IdleTimer::new(Duration::ZERO);
        assert!(expired.is_expired());
    }

    #[tokio::test]
    async fn expires_after_last_reset() {
        let timer = IdleTimer::new(Duration::from_millis(100));
        let started = Instant::now();

        tokio::time::sleep(Duration::from_millis(60)).await;
        timer.reset();
        timer.expired().await;

        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(timer.is_expired());
    }
}
