//! Exponential backoff with jitter, and the retry loop built on it.

use crate::error::{CloudApiError, Result};
use rand::Rng;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

/// Which responses are retried and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub retry_statuses: BTreeSet<u16>,
    pub jitter_base: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_statuses: BTreeSet::from([503]),
            jitter_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay before re-issuing after the `attempt`-th failure (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(
            attempt,
            self.jitter_base,
            self.max_backoff,
            &mut rand::thread_rng(),
        )
    }
}

/// `min(base * 2^attempt + random(0, base), max)`.
///
/// Delays never decrease from one attempt to the next and the delay for
/// zero-based `attempt` never exceeds `base * 2^(attempt + 1)`.
pub fn backoff_delay<R: Rng + ?Sized>(
    attempt: u32,
    base: Duration,
    max: Duration,
    rng: &mut R,
) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let base_nanos = u64::try_from(base.as_nanos()).unwrap_or(u64::MAX);
    let jitter = Duration::from_nanos(rng.gen_range(0..=base_nanos));
    exponential.saturating_add(jitter).min(max)
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retry budget is spent. `op` receives the zero-based attempt number.
pub async fn run_with_retries<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(CloudApiError::Http { status, body }) if policy.should_retry(status) => {
                if attempt >= policy.max_retries {
                    tracing::warn!(
                        status,
                        attempts = attempt + 1,
                        body = %body,
                        "Retry budget exhausted"
                    );
                    return Err(CloudApiError::RetriesExhausted {
                        attempts: attempt + 1,
                        status,
                    });
                }
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    status,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable response, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
