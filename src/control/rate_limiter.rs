//! Token bucket admission control for fresh task executions.
//!
//! One limiter may be shared by every file of a worker pool. Waiters queue
//! on a fair mutex, so tokens are handed out in arrival order.

use super::Shutdown;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// The wait was abandoned because shutdown was signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limiter wait cancelled by shutdown")]
pub struct WaitCancelled;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, per_second: f64, burst: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * per_second).min(burst);
        self.last_refill = now;
    }
}

/// Token bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    per_second: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
    total_admitted: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter issuing `per_second` tokens with capacity `burst`.
    ///
    /// The bucket starts full. A `per_second` that is not a positive
    /// number never refills: once the burst is spent, waiters block until
    /// shutdown. `burst` is raised to at least 1.
    pub fn new(per_second: f64, burst: u32) -> Self {
        let per_second = if per_second.is_finite() && per_second > 0.0 {
            per_second
        } else {
            0.0
        };
        let burst = f64::from(burst.max(1));
        Self {
            per_second,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            total_admitted: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Wait for a token, or until `shutdown` fires.
    ///
    /// Returns the time spent waiting.
    pub async fn wait(&self, shutdown: &Shutdown) -> Result<Duration, WaitCancelled> {
        if shutdown.is_triggered() {
            return Err(WaitCancelled);
        }

        let start = Instant::now();
        let acquire = async {
            let mut bucket = self.bucket.lock().await;
            bucket.refill(self.per_second, self.burst);
            if bucket.tokens < 1.0 {
                let deficit = (1.0 - bucket.tokens) / self.per_second;
                let delay = Duration::try_from_secs_f64(deficit).unwrap_or(Duration::MAX);
                tokio::time::sleep(delay).await;
                bucket.refill(self.per_second, self.burst);
            }
            bucket.tokens -= 1.0;
        };

        tokio::select! {
            () = acquire => {}
            () = shutdown.triggered() => return Err(WaitCancelled),
        }

        let waited = start.elapsed();
        self.total_admitted.fetch_add(1, Ordering::Relaxed);
        if waited > Duration::ZERO {
            self.total_wait_ms
                .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
            debug!(wait_ms = waited.as_millis() as u64, "Waited for rate limit token");
        }
        Ok(waited)
    }

    /// Get statistics.
    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_admitted: self.total_admitted.load(Ordering::Relaxed),
            total_wait_secs: self.total_wait_ms.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

/// Rate limiter statistics.
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub total_admitted: u64,
    pub total_wait_secs: f64,
}
