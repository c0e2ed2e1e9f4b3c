//! Per-source minimum-interval gate (§4.1). `wait()` blocks the caller
//! until at least `min_interval_ms` has elapsed since the last granted
//! slot; `time_until_ready()` peeks the same delay without consuming a
//! slot, so the scheduler can pick the soonest-ready source without
//! racing its own gate.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    min_interval: Duration,
    last_granted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval: Duration::from_millis(min_interval_ms),
            last_granted: Mutex::new(None),
        }
    }

    /// Suspend until at least `min_interval` has elapsed since the last
    /// granted slot, then record "now" as the new last-granted timestamp.
    /// Serialized by an internal mutex, so N concurrent callers are
    /// admitted at intervals of `min_interval` with no further fairness
    /// guarantee between them (the scheduler provides that).
    pub async fn wait(&self) {
        let mut last = self.last_granted.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Nonnegative delay until the next slot, without consuming one.
    pub async fn time_until_ready(&self) -> Duration {
        let last = self.last_granted.lock().await;
        match *last {
            None => Duration::ZERO,
            Some(prev) => {
                let elapsed = prev.elapsed();
                self.min_interval.saturating_sub(elapsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_wait_returns_immediately() {
        let limiter = RateLimiter::new(200);
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_wait_respects_min_interval() {
        let limiter = RateLimiter::new(100);
        limiter.wait().await;
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn time_until_ready_is_zero_before_first_wait() {
        let limiter = RateLimiter::new(500);
        assert_eq!(limiter.time_until_ready().await, Duration::ZERO);
    }

    #[tokio::test]
    async fn time_until_ready_counts_down_after_a_grant() {
        let limiter = RateLimiter::new(200);
        limiter.wait().await;
        let remaining = limiter.time_until_ready().await;
        assert!(remaining <= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn concurrent_waiters_are_spaced_by_min_interval() {
        let limiter = std::sync::Arc::new(RateLimiter::new(50));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.wait().await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(95));
    }
}
