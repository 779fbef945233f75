//! Bounded retry for external service calls
//!
//! **Algorithm:**
//! 1. Wait for the service's own pacing quota
//! 2. Wait on the pool-wide [`RateBudget`]. This must come after step 1: a
//!    pause signalled while the task queued for its service quota is still
//!    honoured, because the budget re-checks the pause gate last.
//! 3. Attempt the call
//! 4. On success (including a "not found" answer), return it
//! 5. On a rate-limit signal: pause the whole pool, then go to 1.
//!    Does not consume an attempt.
//! 6. On a transient failure: if attempts remain, back off and go to 1;
//!    otherwise give up with the last error
//! 7. On a rejection: give up immediately
//!
//! **Backoff Strategy:** exponential from `initial_backoff`, doubling,
//! capped at `max_backoff`. Backoff suspends only the calling task.

use crate::rate_budget::RateBudget;
use crate::services::ServiceError;
use std::future::Future;
use std::time::Duration;

/// Retry limits for one service call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries for transient failures, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Rate-limit pauses tolerated before the call is abandoned
    pub max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            max_rate_limit_waits: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failures`-th transient failure (1-based)
    pub fn backoff_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Run `operation` under `policy`, sharing `budget` with every other caller
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "ISRC lookup")
/// * `subject` - Identifier being processed, for logging
/// * `pace` - Per-service pacing wait, awaited before every attempt
///
/// # Returns
/// The operation's result, or the last error once the policy gives up
pub async fn call_with_retry<P, PFut, F, Fut, T>(
    operation_name: &str,
    subject: &str,
    policy: &RetryPolicy,
    budget: &RateBudget,
    mut pace: P,
    mut operation: F,
) -> Result<T, ServiceError>
where
    P: FnMut() -> PFut,
    PFut: Future<Output = ()>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut failures = 0u32;
    let mut rate_limit_waits = 0u32;

    loop {
        pace().await;
        budget.acquire().await;

        match operation().await {
            Ok(result) => {
                if failures > 0 || rate_limit_waits > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        subject,
                        failures,
                        rate_limit_waits,
                        "Service call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(ServiceError::RateLimited { retry_after }) => {
                rate_limit_waits += 1;
                if rate_limit_waits > policy.max_rate_limit_waits {
                    tracing::warn!(
                        operation = operation_name,
                        subject,
                        rate_limit_waits,
                        "Still rate limited after maximum waits, abandoning for this run"
                    );
                    return Err(ServiceError::RateLimited { retry_after });
                }
                budget.pause_for(retry_after);
            }
            Err(err @ ServiceError::Rejected(..)) => {
                tracing::warn!(
                    operation = operation_name,
                    subject,
                    error = %err,
                    "Service rejected request, not retrying"
                );
                return Err(err);
            }
            Err(err @ ServiceError::Transient(_)) => {
                failures += 1;
                if failures >= policy.max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        subject,
                        attempts = failures,
                        error = %err,
                        "Service call failed: retries exhausted"
                    );
                    return Err(err);
                }

                let backoff = policy.backoff_after(failures);
                tracing::debug!(
                    operation = operation_name,
                    subject,
                    attempt = failures,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient service failure, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
