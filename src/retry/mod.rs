//! Generic retry executor with classified backoff.
//!
//! Runs an operation and, when it fails with a retryable classification,
//! re-runs it up to the attempt budget with capped exponential backoff and
//! per-call jitter. The engine has no shared mutable state; every
//! invocation is independent and safe to run concurrently. Cancellation
//! mid-operation is not supported and no timeout is imposed beyond the
//! capped delay and the attempt budget.

use std::future::Future;
use std::sync::Arc;

use crate::error::{classify, retry_delay, should_auto_retry, ErrorDetails, RawError};

/// Per-invocation retry policy: an attempt budget and a predicate over the
/// classified error deciding whether another attempt is worthwhile.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    retry_condition: Arc<dyn Fn(&ErrorDetails) -> bool + Send + Sync>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and the default
    /// condition, [`should_auto_retry`]. Budgets below 1 are treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_condition: Arc::new(should_auto_retry),
        }
    }

    /// Replaces the retry condition. Callers that adjust parameters between
    /// attempts (e.g. bumping a too-low gas price) should widen the
    /// condition here rather than relying on the default set.
    pub fn with_retry_condition(
        mut self,
        condition: impl Fn(&ErrorDetails) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry_condition = Arc::new(condition);
        self
    }

    /// Returns the attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Evaluates the retry condition.
    pub fn should_retry(&self, details: &ErrorDetails) -> bool {
        (self.retry_condition)(details)
    }
}

/// Executes `operation`, retrying on retryable failures.
///
/// The operation receives the 1-based attempt number. On failure the error
/// is classified; when attempts remain and the policy's condition holds,
/// the engine sleeps for [`retry_delay`] and re-invokes the operation,
/// otherwise the final error is propagated unchanged to the caller.
pub async fn retry<T, E, F, Fut>(mut operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let details = classify(&RawError::new(err.to_string()));
                if attempt >= policy.max_attempts() || !policy.should_retry(&details) {
                    return Err(err);
                }
                let delay = retry_delay(&details, attempt);
                tracing::debug!(
                    target: "walletguard::retry",
                    code = %details.code,
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "operation failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
