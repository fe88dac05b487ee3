//! Request pacing and retry policy
//!
//! This module handles:
//! - Spacing outbound API calls by a minimum interval
//! - Per-call deadlines
//! - Unbounded exponential backoff for transient failures and bans

use crate::api::{ApiError, ApiResult};
use crate::config::Config;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Largest exponent applied to a backoff base
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Default)]
struct RateLimiterState {
    last_request: Option<Instant>,
}

/// Shared pacing token for outbound calls
///
/// Clones share the same last-request timestamp, so every call made through
/// any clone is spaced against every other.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<RateLimiterState>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimiterState::default())),
            min_interval,
        }
    }

    /// Waits until a call may be issued and records it
    ///
    /// With `must_wait`, sleeps for whatever remains of the minimum interval
    /// since the previous call. Without it, returns at once. Either way the
    /// call time is recorded.
    pub async fn acquire(&self, must_wait: bool) {
        let mut state = self.state.lock().await;

        if must_wait {
            if let Some(last) = state.last_request {
                let elapsed = last.elapsed();
                if elapsed < self.min_interval {
                    let wait = self.min_interval - elapsed;
                    tracing::trace!("Rate limiter waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }

        state.last_request = Some(Instant::now());
    }
}

/// Backoff bases and the per-call deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_base: Duration,
    pub ban_base: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_base: config.crawler.retry_base(),
            ban_base: config.crawler.ban_backoff(),
            call_timeout: config.api.call_timeout(),
        }
    }
}

/// Exponential backoff: `base * 2^attempt`, exponent capped
pub fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(MAX_BACKOFF_EXPONENT))
}

/// Runs `op` until it succeeds
///
/// Every attempt first passes through the rate limiter and is bounded by
/// `policy.call_timeout`. Timeouts, transient failures and malformed
/// responses back off from `policy.retry_base`; access denials back off from
/// `policy.ban_base` with their own attempt counter. There is no attempt
/// limit.
pub async fn call_with_retry<T, F, Fut>(
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    must_wait: bool,
    mut op: F,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt = 0u32;
    let mut ban_attempt = 0u32;

    loop {
        limiter.acquire(must_wait).await;

        let error = match tokio::time::timeout(policy.call_timeout, op()).await {
            Ok(Ok(value)) => return value,
            Ok(Err(e)) => e,
            Err(_) => ApiError::Transient(format!(
                "call exceeded {:?} deadline",
                policy.call_timeout
            )),
        };

        let delay = match &error {
            ApiError::AccessDenied(_) => {
                let delay = backoff(policy.ban_base, ban_attempt);
                ban_attempt = ban_attempt.saturating_add(1);
                delay
            }
            ApiError::Transient(_) | ApiError::Malformed(_) => {
                let delay = backoff(policy.retry_base, attempt);
                attempt = attempt.saturating_add(1);
                delay
            }
        };

        tracing::warn!("{}; retrying in {:?}", error, delay);
        tokio::time::sleep(delay).await;
    }
}
