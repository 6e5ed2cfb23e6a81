//! Request pacing for one fetch session

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Per-session rate limiter
///
/// Guarantees the gap between successive `wait()` returns is never less
/// than `60 / rate_per_minute` seconds. One instance is scoped to one
/// source in one session, so concurrent sources never throttle each other.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
}

struct RateLimiterInner {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter for the given requests per minute
    pub fn new(rate_per_minute: f64) -> Self {
        let interval_ms = (60_000.0 / rate_per_minute.max(f64::MIN_POSITIVE)) as u64;

        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                last_request: None,
                min_interval: Duration::from_millis(interval_ms),
            })),
        }
    }

    /// Wait until the next request is allowed. Never errors.
    pub async fn wait(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(last) = inner.last_request {
            let elapsed = last.elapsed();
            if elapsed < inner.min_interval {
                let wait_time = inner.min_interval - elapsed;
                trace!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        inner.last_request = Some(Instant::now());
    }
}
