use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::domain::error::RateLimitError;
use crate::services::rate_limiter::TokenBucketRateLimiter;

/// A status callback invoked before each attempt's sleep with `(attempt, max_retries, wait)`.
pub type StatusCallback = Box<dyn Fn(u32, u32, Duration) + Send + Sync>;

/// Bounded exponential-backoff retry policy layered on top of a [`TokenBucketRateLimiter`].
///
/// Mirrors the token-bucket-plus-retry contract of §4.1: `wait()` paces admission, `call`
/// retries transient failures with jitter up to 20%.
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, initial_backoff_ms: 500, max_backoff_ms: 30_000 }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self { max_retries, initial_backoff_ms, max_backoff_ms }
    }

    /// `initial_backoff × 2^(attempt-1)`, capped at `max_backoff_ms`, plus up to 20% jitter.
    #[must_use]
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exp = self.initial_backoff_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
        let capped = exp.min(self.max_backoff_ms);
        let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..=0.2);
        let jittered = (capped as f64) * (1.0 + jitter_frac);
        Duration::from_millis(jittered as u64)
    }

    /// Runs `f` under rate-limiter admission, retrying transient errors up to `max_retries`
    /// times with backoff. `status` is invoked before each retry sleep.
    pub async fn execute<F, Fut, T, E>(
        &self,
        limiter: &TokenBucketRateLimiter,
        status: Option<&StatusCallback>,
        mut f: F,
    ) -> Result<T, RateLimitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + TransientClassifier,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            limiter.wait().await;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    let wait = self.calculate_backoff(attempt);
                    if let Some(cb) = status {
                        cb(attempt, self.max_retries, wait);
                    }
                    warn!(attempt, max_retries = self.max_retries, %e, "transient error, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(RateLimitError::Exhausted { attempts: attempt, message: e.to_string() });
                }
                Err(e) => return Err(RateLimitError::Permanent(e.to_string())),
            }
        }
    }
}

/// Implemented by error types that can be fed into [`RetryPolicy::execute`].
pub trait TransientClassifier {
    fn is_transient(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Boom(bool);
    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }
    impl TransientClassifier for Boom {
        fn is_transient(&self) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let policy = RetryPolicy::default();
        let limiter = TokenBucketRateLimiter::new(600.0);
        let result: Result<u32, Boom> = policy.execute(&limiter, None, || async { Ok(7) }).await.map(|v| v);
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let policy = RetryPolicy::new(3, 1, 2);
        let limiter = TokenBucketRateLimiter::new(6000.0);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = policy
            .execute(&limiter, None, move || {
                let calls = calls2.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err(Boom(true)) } else { Ok::<_, Boom>(99) }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let policy = RetryPolicy::default();
        let limiter = TokenBucketRateLimiter::new(600.0);
        let result: Result<u32, _> = policy.execute(&limiter, None, || async { Err(Boom(false)) }).await;
        assert!(matches!(result, Err(RateLimitError::Permanent(_))));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::new(5, 100, 400);
        assert!(policy.calculate_backoff(1).as_millis() >= 100);
        assert!(policy.calculate_backoff(10).as_millis() <= 480); // capped + 20% jitter
    }
}
