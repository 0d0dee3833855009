//! Outbound-request pacing and retry utilities.
//!
//! Two separate concerns live here. [`retry_with_backoff`] re-runs an
//! operation on transient failures with exponential delays; it backs the
//! detail-view open and the fallback-provider client. [`AdaptiveRateLimiter`]
//! paces outbound website fetches against arbitrary third-party hosts: a
//! sliding one-minute window of recent request times, a delay that doubles
//! once the window fills, and random jitter so concurrent fetchers never
//! synchronize into bursts.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;

/// Executes `operation` with exponential backoff retries on errors that
/// `is_retriable` accepts.
///
/// On a retriable error the function sleeps `backoff_base * 2^attempt` and
/// tries again, up to `max_retries` additional attempts after the first try.
/// Non-retriable errors and exhaustion return the last error immediately.
pub(crate) async fn retry_with_backoff<T, E, F, Fut, R>(
    max_retries: u32,
    backoff_base: Duration,
    is_retriable: R,
    mut operation: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                // Exponential backoff: base * 2^attempt, saturating.
                let delay = backoff_base.saturating_mul(1u32 << attempt.min(16));
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient failure — retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Adaptive pacing for outbound fetches.
///
/// Tracks request timestamps over a sliding window; while the window holds
/// fewer than `threshold` requests the delay is `base_delay`, otherwise it
/// doubles (bounded by `max_delay`). A uniform random jitter of up to
/// `jitter` is always added.
pub struct AdaptiveRateLimiter {
    window: Duration,
    threshold: usize,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
    recent: Mutex<VecDeque<Instant>>,
}

impl AdaptiveRateLimiter {
    #[must_use]
    pub fn new(requests_per_minute: u32, base_delay: Duration, max_delay: Duration) -> Self {
        AdaptiveRateLimiter {
            window: Duration::from_secs(60),
            threshold: requests_per_minute as usize,
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: Duration::from_millis(500),
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Sleep for the currently appropriate delay, then record this request.
    pub async fn acquire(&self) {
        let delay = self.next_delay(Instant::now());
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::rng().random_range(0..=jitter_ms));
        tokio::time::sleep(delay + jitter).await;
        self.record(Instant::now());
    }

    /// Delay the limiter would apply for a request at `now`, without jitter.
    fn next_delay(&self, now: Instant) -> Duration {
        let mut recent = self.recent.lock().expect("limiter lock");
        while let Some(front) = recent.front() {
            if now.duration_since(*front) >= self.window {
                recent.pop_front();
            } else {
                break;
            }
        }
        if recent.len() >= self.threshold {
            self.max_delay.min(self.base_delay.saturating_mul(2))
        } else {
            self.base_delay
        }
    }

    fn record(&self, at: Instant) {
        self.recent.lock().expect("limiter lock").push_back(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("transient")]
        Transient,
        #[error("permanent")]
        Permanent,
    }

    fn retriable(err: &TestError) -> bool {
        matches!(err, TestError::Transient)
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, Duration::ZERO, retriable, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, TestError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, Duration::ZERO, retriable, || {
            let cc = Arc::clone(&cc);
            async move {
                let n = cc.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok::<u32, TestError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhausting_retries() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(2, Duration::ZERO, retriable, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, TestError>(TestError::Transient)
            }
        })
        .await;
        // max_retries=2 -> 3 total attempts
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(TestError::Transient)));
    }

    #[tokio::test]
    async fn does_not_retry_non_retriable_error() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, Duration::ZERO, retriable, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, TestError>(TestError::Permanent)
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(TestError::Permanent)));
    }

    #[test]
    fn delay_is_base_below_threshold() {
        let limiter = AdaptiveRateLimiter::new(
            60,
            Duration::from_millis(500),
            Duration::from_millis(5000),
        );
        let now = Instant::now();
        for _ in 0..59 {
            limiter.record(now);
        }
        assert_eq!(limiter.next_delay(now), Duration::from_millis(500));
    }

    #[test]
    fn delay_doubles_when_window_is_saturated() {
        let limiter = AdaptiveRateLimiter::new(
            60,
            Duration::from_millis(500),
            Duration::from_millis(5000),
        );
        let now = Instant::now();
        for _ in 0..60 {
            limiter.record(now);
        }
        assert_eq!(limiter.next_delay(now), Duration::from_millis(1000));
    }

    #[test]
    fn doubled_delay_is_capped_by_max() {
        let limiter = AdaptiveRateLimiter::new(
            10,
            Duration::from_millis(800),
            Duration::from_millis(1000),
        );
        let now = Instant::now();
        for _ in 0..10 {
            limiter.record(now);
        }
        assert_eq!(limiter.next_delay(now), Duration::from_millis(1000));
    }

    #[test]
    fn requests_older_than_the_window_fall_out() {
        let limiter = AdaptiveRateLimiter::new(
            5,
            Duration::from_millis(500),
            Duration::from_millis(5000),
        );
        let old = Instant::now();
        for _ in 0..5 {
            limiter.record(old);
        }
        // A probe 61 seconds later sees an empty window.
        let later = old + Duration::from_secs(61);
        assert_eq!(limiter.next_delay(later), Duration::from_millis(500));
        assert!(limiter.recent.lock().unwrap().is_empty());
    }
}
