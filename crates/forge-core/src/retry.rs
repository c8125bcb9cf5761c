//! Bounded retry with exponential backoff
//!
//! Worker invocations run under an explicit policy owned by this crate: a
//! per-attempt wall-clock timeout plus a bounded attempt count, so failure
//! semantics stay testable without any LLM behind them.

use crate::error::{Error, Result};
use crate::roster::RoleSpec;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for one worker invocation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Wall-clock limit per attempt
    pub attempt_timeout: Duration,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Cap on the delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(120),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Build the policy for a role from its configured execution limits
    #[must_use]
    pub fn for_role(role: &RoleSpec) -> Self {
        Self {
            max_attempts: role.execution.max_retries.max(1),
            attempt_timeout: role.execution.attempt_timeout(),
            ..Self::default()
        }
    }

    /// Set maximum attempts
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the initial delay
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Calculate the delay after a given (1-based) failed attempt
    fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped = base.min(self.max_delay.as_millis() as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Run an operation under this policy.
    ///
    /// The operation receives the 1-based attempt number. Returns the value
    /// and the number of attempts used.
    ///
    /// # Errors
    /// Returns the last attempt's error (or a timeout error) once the
    /// attempt budget is exhausted.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<(T, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = Error::Execution("no attempts were made".to_string());

        for attempt in 1..=self.max_attempts {
            match tokio::time::timeout(self.attempt_timeout, operation(attempt)).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok((value, attempt));
                }
                Ok(Err(e)) => {
                    last_error = e;
                }
                Err(_) => {
                    last_error = Error::Execution(format!(
                        "attempt timed out after {}s",
                        self.attempt_timeout.as_secs()
                    ));
                }
            }

            if attempt < self.max_attempts {
                let delay = self.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Attempt failed, retrying"
                );
                sleep(delay).await;
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
        assert_eq!(policy.delay_after(4), Duration::from_millis(300));
    }

    #[test]
    fn test_for_role_uses_execution_limits() {
        let role = RoleSpec {
            name: "backend".to_string(),
            role: "Backend".to_string(),
            goal: "Implement".to_string(),
            backstory: String::new(),
            allow_code_execution: true,
            execution: crate::roster::ExecutionLimits {
                mode: crate::roster::ExecutionMode::Sandboxed,
                max_execution_secs: 500,
                max_retries: 3,
            },
        };
        let policy = RetryPolicy::for_role(&role);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(500));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let (value, attempts) = fast_policy(3)
            .run(|_| async { Ok::<_, Error>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_success_after_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let (value, attempts) = fast_policy(3)
            .run(move |_| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Execution("transient".to_string()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(attempts, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = fast_policy(2)
            .run(move |attempt| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Error::Execution(format!("failure {attempt}")))
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failure 2"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let policy = fast_policy(1).with_attempt_timeout(Duration::from_millis(10));

        let result = policy
            .run(|_| async {
                sleep(Duration::from_secs(5)).await;
                Ok::<_, Error>(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
