//! Per-`"provider/model"` token-bucket rate limiting.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use lumen_types::TokenBucket;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Token-bucket rate limiter keyed by `"provider/model"`.
///
/// Buckets are process-wide and mutated only through `acquire` (refill +
/// decrement) and `update_rate_limit` (replace/remove); readers never see a
/// torn bucket because the whole map sits behind one `RwLock`, matching the
/// single-lock discipline the orchestrator uses for its other shared state.
pub struct Throttler {
    buckets: RwLock<HashMap<String, TokenBucket>>,
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new()
    }
}

impl Throttler {
    /// Construct an empty throttler (no buckets configured ⇒ unlimited).
    pub fn new() -> Self {
        Self { buckets: RwLock::new(HashMap::new()) }
    }

    fn key(provider: &str, model: &str) -> String {
        format!("{provider}/{model}")
    }

    /// Configured request timeout for `provider/model`, or the 30s default
    /// when no bucket (i.e. no rate limit) has been configured.
    pub async fn get_timeout(&self, provider: &str, model: &str) -> Duration {
        let buckets = self.buckets.read().await;
        match buckets.get(&Self::key(provider, model)) {
            Some(bucket) => Duration::from_millis(bucket.request_timeout_ms),
            None => DEFAULT_TIMEOUT,
        }
    }

    /// Replace (or remove, if `max_rps == 0`) the bucket for `provider/model`.
    pub async fn update_rate_limit(
        &self,
        provider: &str,
        model: &str,
        max_rps: u32,
        timeout_ms: u64,
    ) {
        let key = Self::key(provider, model);
        let mut buckets = self.buckets.write().await;
        if max_rps == 0 {
            buckets.remove(&key);
        } else {
            buckets.insert(key, TokenBucket::new(max_rps, timeout_ms));
        }
    }

    /// Acquire one token for `provider/model`, refilling first and sleeping
    /// in bounded 10ms increments on a miss. Returns `Err` if `cancel` fires
    /// before a token becomes available.
    pub async fn acquire(
        &self,
        provider: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ()> {
        let key = Self::key(provider, model);
        loop {
            {
                let mut buckets = self.buckets.write().await;
                match buckets.get_mut(&key) {
                    None => return Ok(()),
                    Some(bucket) => {
                        refill(bucket);
                        if bucket.tokens >= 1.0 {
                            bucket.tokens -= 1.0;
                            return Ok(());
                        }
                    }
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = cancel.cancelled() => return Err(()),
            }
        }
    }
}

fn refill(bucket: &mut TokenBucket) {
    let now = Utc::now();
    let elapsed_seconds = (now - bucket.last_refill).num_milliseconds() as f64 / 1000.0;
    if elapsed_seconds > 0.0 {
        let to_add = (elapsed_seconds * bucket.max_rps as f64).floor();
        if to_add > 0.0 {
            bucket.tokens = (bucket.tokens + to_add).min(bucket.max_rps as f64);
            bucket.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_n_acquires_do_not_wait() {
        let throttler = Throttler::new();
        throttler.update_rate_limit("openai", "gpt-4o", 3, 1_000).await;
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            throttler.acquire("openai", "gpt-4o", &cancel).await.unwrap();
        }
    }

    #[tokio::test]
    async fn unconfigured_bucket_is_unlimited() {
        let throttler = Throttler::new();
        let cancel = CancellationToken::new();
        for _ in 0..10 {
            throttler.acquire("openai", "gpt-4o", &cancel).await.unwrap();
        }
        assert_eq!(throttler.get_timeout("openai", "gpt-4o").await, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn zero_rps_removes_bucket() {
        let throttler = Throttler::new();
        throttler.update_rate_limit("openai", "gpt-4o", 1, 1_000).await;
        throttler.update_rate_limit("openai", "gpt-4o", 0, 1_000).await;
        assert_eq!(throttler.get_timeout("openai", "gpt-4o").await, Duration::from_secs(30));
    }
}
