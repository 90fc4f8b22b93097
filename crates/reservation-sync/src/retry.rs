//! Fixed-delay retry wrapper for external calls.
//!
//! Every feed request, notification delivery and assignment call goes through
//! [`RetryPolicy::execute`], which bounds each attempt with a timeout and
//! retries transient failures a fixed number of times.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can tell whether retrying might help.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Outcome of a call that did not succeed within the policy.
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// Every attempt failed with a transient error.
    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: E,
    },

    /// The final attempt did not finish in time.
    #[error("{operation} timed out after {attempts} attempt(s) ({timeout:?} each)")]
    TimedOut {
        operation: String,
        attempts: u32,
        timeout: Duration,
    },

    /// The call failed in a way retrying cannot fix.
    #[error("{operation} failed: {error}")]
    Permanent {
        operation: String,
        #[source]
        error: E,
    },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// The underlying error of the last attempt, if it did not time out.
    #[must_use]
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Permanent { error, .. } => Some(error),
            Self::TimedOut { .. } => None,
        }
    }
}

/// Retry policy: bounded attempts, fixed delay, per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1).
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
    /// Upper bound for a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            attempts,
            delay,
            timeout,
        }
    }

    /// Run `f` until it succeeds, fails permanently, or attempts run out.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        mut f: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + std::error::Error + 'static,
    {
        let max_attempts = self.attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match tokio::time::timeout(self.timeout, f()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Ok(Err(error)) if !error.is_transient() => {
                    return Err(RetryError::Permanent {
                        operation: operation.to_string(),
                        error,
                    });
                }
                Ok(Err(error)) => {
                    if attempt >= max_attempts {
                        warn!(operation, attempts = attempt, error = %error, "Max retries exceeded");
                        return Err(RetryError::Exhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            last: error,
                        });
                    }
                    debug!(
                        operation,
                        attempt,
                        max_attempts,
                        delay = ?self.delay,
                        error = %error,
                        "Retrying after transient error"
                    );
                }
                Err(_) => {
                    if attempt >= max_attempts {
                        warn!(operation, attempts = attempt, "Timed out on every attempt");
                        return Err(RetryError::TimedOut {
                            operation: operation.to_string(),
                            attempts: attempt,
                            timeout: self.timeout,
                        });
                    }
                    debug!(operation, attempt, timeout = ?self.timeout, "Attempt timed out, retrying");
                }
            }

            tokio::time::sleep(self.delay).await;
        }
    }
}
