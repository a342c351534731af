use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Token-bucket pacer keyed by `requests_per_minute`.
///
/// Capacity equals `requests_per_minute`; refill rate is `requests_per_minute / 60` tokens
/// per second, applied lazily on access (no background task).
#[derive(Debug, Clone)]
pub struct TokenBucketRateLimiter {
    inner: Arc<Mutex<BucketState>>,
    requests_per_minute: f64,
    capacity: f64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    #[must_use]
    pub fn new(requests_per_minute: f64) -> Self {
        let capacity = requests_per_minute.max(1.0);
        Self {
            inner: Arc::new(Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() })),
            requests_per_minute,
            capacity,
        }
    }

    fn refill_rate_per_sec(&self) -> f64 {
        self.requests_per_minute / 60.0
    }

    /// Blocks until at least one token is available, then consumes it.
    pub async fn wait(&self) {
        loop {
            let sleep_for = {
                let mut state = self.inner.lock().await;
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_rate_per_sec()).min(self.capacity);
                state.last_refill = Instant::now();

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_rate_per_sec().max(f64::EPSILON)))
                }
            };

            match sleep_for {
                None => return,
                Some(d) => sleep(d).await,
            }
        }
    }

    /// Current token count, for diagnostics/tests. Does not consume.
    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.inner.lock().await;
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate_per_sec()).min(self.capacity);
        state.last_refill = Instant::now();
        state.tokens
    }
}
