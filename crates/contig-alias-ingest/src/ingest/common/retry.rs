//! Bounded retry with exponential backoff
//!
//! The first retry waits `initial_delay`; each further retry doubles the wait
//! up to `max_delay`. Only errors for which
//! [`IngestError::is_transient`] holds are retried.

use crate::config::RetryConfig;
use crate::error::IngestError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based, counting the failed attempt)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run a blocking operation under this policy
    ///
    /// Sleeps the calling thread between attempts, so call it from a blocking
    /// context such as `tokio::task::spawn_blocking`.
    pub fn run_blocking<T, F>(&self, operation: &str, mut attempt_fn: F) -> Result<T, IngestError>
    where
        F: FnMut(u32) -> Result<T, IngestError>,
    {
        let mut attempt = 1;
        loop {
            debug!(operation, attempt, max_attempts = self.max_attempts, "Attempting");
            match attempt_fn(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt failed, retrying in {:?}",
                        delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Async counterpart of [`run_blocking`](Self::run_blocking)
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, IngestError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, IngestError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ReportParseError;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(2_000),
            max_delay: Duration::from_millis(30_000),
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = policy();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(16));
        assert_eq!(policy.delay_after(5), Duration::from_secs(30));
        assert_eq!(policy.delay_after(40), Duration::from_secs(30));
    }

    #[test]
    fn test_transient_errors_are_retried_until_success() {
        let mut calls = 0;
        let result = RetryPolicy::immediate(5).run_blocking("list", |_| {
            calls += 1;
            if calls < 3 {
                Err(IngestError::transient("list", "timed out"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::immediate(5).run_blocking("list", |_| {
            calls += 1;
            Err(IngestError::transient("list", "connection refused"))
        });
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls, 5);
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::immediate(5).run_blocking("parse", |_| {
            calls += 1;
            Err(IngestError::Parse(ReportParseError::MissingAssemblyAccession))
        });
        assert!(matches!(result, Err(IngestError::Parse(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_run_sleeps_between_attempts() {
        let started = tokio::time::Instant::now();
        let mut calls = 0;
        let result = policy()
            .run("checksum", |_| {
                calls += 1;
                let fail = calls < 3;
                async move {
                    if fail {
                        Err(IngestError::transient("checksum", "503"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls, 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }
}
