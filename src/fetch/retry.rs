// src/fetch/retry.rs
//! Bounded retries with exponential backoff
//!
//! Only [`FetchError::Transient`] failures are retried. A 404, a rejected
//! request or malformed content fails immediately.

use super::{FetchError, FetchRequest, StubFetcher};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default number of attempts, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
/// Default ceiling on a single delay
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// Retry schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first; at least 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based),
    /// without jitter: `base * 2^(attempt-1)`, capped at `max_delay`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff plus up to 50% random jitter, still capped at `max_delay`
    fn jittered(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        let spread = delay.as_millis() as u64 / 2;
        let jitter = if spread > 0 {
            rand::thread_rng().gen_range(0..=spread)
        } else {
            0
        };
        (delay + Duration::from_millis(jitter)).min(self.max_delay)
    }
}

/// Wraps a fetcher and retries transient failures
pub struct RetryingFetcher {
    inner: Arc<dyn StubFetcher>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(inner: Arc<dyn StubFetcher>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl StubFetcher for RetryingFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.inner.fetch(request).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.jittered(attempt);
                    warn!(
                        "Fetch attempt {} for {} failed: {}, retrying in {:?}",
                        attempt, request.relative_path, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() && max_attempts > 1 => {
                    return Err(FetchError::Exhausted {
                        path: request.relative_path.clone(),
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
