//! Client-side request pacing toward one provider.
//!
//! Two limits apply: a rolling per-minute budget (governor) and a minimum gap
//! between consecutive requests. Waiters queue on a fair mutex, so requests
//! leave in the order they arrived.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Paces requests to one provider.
pub struct Throttle {
    budget: DefaultDirectRateLimiter,
    min_interval: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

impl Throttle {
    /// Allow `per_minute` requests per rolling minute, at least `min_interval`
    /// apart. A zero budget is treated as one.
    #[must_use]
    pub fn new(min_interval: Duration, per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            budget: RateLimiter::direct(Quota::per_minute(per_minute)),
            min_interval,
            last_sent: Mutex::new(None),
        }
    }

    /// Wait for this caller's turn.
    pub async fn acquire(&self) {
        // tokio's Mutex is FIFO-fair; holding it while waiting keeps order
        let mut last_sent = self.last_sent.lock().await;

        self.budget.until_ready().await;

        if let Some(previous) = *last_sent {
            tokio::time::sleep_until(previous + self.min_interval).await;
        }
        *last_sent = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_enforces_min_interval() {
        let throttle = Throttle::new(Duration::from_millis(50), 600);
        let start = Instant::now();
        for _ in 0..3 {
            throttle.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let throttle = Throttle::new(Duration::from_secs(10), 5);
        let start = Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_queued_requests_leave_in_order() {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(20), 600));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let throttle = Arc::clone(&throttle);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                throttle.acquire().await;
                order.lock().await.push(i);
            }));
            // Let each task reach the queue before spawning the next
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        for handle in handles {
            handle.await.ok();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3]);
    }
}
