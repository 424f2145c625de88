//! Per-call timeout and retry with jittered exponential backoff.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use super::{StoreError, StoreResult};

/// Retry settings for every store call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles per attempt.
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff.
    pub max_delay_ms: u64,
    /// Deadline for one attempt.
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            timeout_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// No retries and a short deadline. Used by tests and the memory store.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 1,
            max_delay_ms: 1,
            timeout_secs: 30,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Jittered backoff for the given (1-based) retry number.
    fn backoff(&self, retry: u32) -> Duration {
        use rand::Rng;

        let shift = retry.saturating_sub(1).min(16);
        let base_ms = self
            .base_delay_ms
            .saturating_mul(1 << shift)
            .min(self.max_delay_ms);
        let jittered_ms = rand::thread_rng().gen_range(base_ms / 2..=base_ms.max(1));
        Duration::from_millis(jittered_ms.max(1))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut retries = 0;
        let deadline = self.timeout();

        loop {
            let result = match tokio::time::timeout(deadline, op()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout {
                    operation: operation.to_string(),
                    elapsed: deadline,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    let backoff = self.backoff(retries);

                    warn!(
                        error = %e,
                        operation,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying store call"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
