//! Retry policy with exponential backoff and full jitter
//!
//! After failed attempt `n` the next attempt waits a uniformly random delay in
//! `[0, min(max_delay, multiplier * 2^(n-1))]`. With the defaults (multiplier
//! 1s, cap 60s, 5 attempts) the windows are 1s, 2s, 4s and 8s.

use forge_core::RetryConfig;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Errors that can tell whether they are worth retrying
pub trait RetryClassify {
    /// Rate limits and transient transport failures
    fn is_transient(&self) -> bool;
}

/// Which failures consume a retry instead of failing immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOn {
    /// Every error is retried up to the attempt cap
    #[default]
    AllErrors,
    /// Only errors classified as transient are retried
    TransientOnly,
}

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base of the exponential window
    pub multiplier: Duration,
    /// Upper bound of the window
    pub max_delay: Duration,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            multiplier: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            retry_on: RetryOn::AllErrors,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            multiplier: config.multiplier(),
            max_delay: config.max_delay(),
            retry_on: if config.retry_all_errors {
                RetryOn::AllErrors
            } else {
                RetryOn::TransientOnly
            },
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            multiplier: Duration::ZERO,
            max_delay: Duration::ZERO,
            retry_on: RetryOn::AllErrors,
        }
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Whether an error may consume another attempt
    pub fn should_retry<E: RetryClassify>(&self, error: &E) -> bool {
        match self.retry_on {
            RetryOn::AllErrors => true,
            RetryOn::TransientOnly => error.is_transient(),
        }
    }

    /// Upper bound of the wait after failed attempt `attempt` (1-based)
    pub fn backoff_window(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let window = self.multiplier.as_secs_f64() * 2f64.powi(exponent);
        Duration::try_from_secs_f64(window.min(self.max_delay.as_secs_f64()))
            .unwrap_or(self.max_delay)
    }

    /// Random wait drawn from the backoff window
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let window = self.backoff_window(attempt).as_secs_f64();
        if window <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(rand::rng().random_range(0.0..=window))
            .unwrap_or(self.max_delay)
    }
}

/// The operation never succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted<E> {
    /// Attempts actually made
    pub attempts: u32,
    pub last_error: E,
}

impl<E: Display> Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

/// Run `f` under `policy`, sleeping between failed attempts
///
/// `f` receives the 1-based attempt number. A non-retryable error stops
/// immediately; otherwise the last error is returned once `max_attempts`
/// attempts have failed.
pub async fn execute_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut f: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClassify + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match f(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "{} succeeded after retry", operation_name
                    );
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !policy.should_retry(&error) {
            error!(
                operation = operation_name,
                attempt,
                "{} failed with non-retryable error: {}",
                operation_name,
                error
            );
            return Err(RetryExhausted {
                attempts: attempt,
                last_error: error,
            });
        }

        if attempt >= max_attempts {
            error!(
                operation = operation_name,
                attempt,
                "{} failed after {} attempts: {}",
                operation_name,
                max_attempts,
                error
            );
            return Err(RetryExhausted {
                attempts: attempt,
                last_error: error,
            });
        }

        let delay = policy.backoff_delay(attempt);
        warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "{} failed (attempt {}/{}): {}. Retrying...",
            operation_name,
            attempt,
            max_attempts,
            error
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient: {})", self.transient)
        }
    }

    impl RetryClassify for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    #[test]
    fn test_backoff_window_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_window(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_window(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_window(4), Duration::from_secs(8));
        assert_eq!(policy.backoff_window(7), Duration::from_secs(60));
        assert_eq!(policy.backoff_window(64), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_delay_within_window() {
        let policy = RetryPolicy::default();
        for attempt in 1..=8 {
            let delay = policy.backoff_delay(attempt);
            assert!(delay <= policy.backoff_window(attempt));
        }
        assert_eq!(RetryPolicy::immediate(3).backoff_delay(2), Duration::ZERO);
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            retry_all_errors: false,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.retry_on, RetryOn::TransientOnly);
    }

    #[test]
    fn test_saturated_config_does_not_panic() {
        let config = RetryConfig {
            multiplier_secs: f64::INFINITY,
            max_delay_secs: 1e300,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.backoff_window(3), Duration::MAX);
        assert!(policy.backoff_delay(3) <= Duration::MAX);
    }

    #[tokio::test]
    async fn test_always_failing_makes_max_attempts() {
        let mut attempts = 0;
        let result: Result<(), _> =
            execute_with_policy(&RetryPolicy::immediate(5), "test_op", |_| {
                attempts += 1;
                async { Err(TestError { transient: true }) }
            })
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 5);
        assert_eq!(attempts, 5);
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let mut attempts = 0;
        let result = execute_with_policy(&RetryPolicy::immediate(5), "test_op", |attempt| {
            attempts += 1;
            async move {
                if attempt < 3 {
                    Err(TestError { transient: true })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_all_errors_retries_non_transient() {
        let mut attempts = 0;
        let result: Result<(), _> =
            execute_with_policy(&RetryPolicy::immediate(4), "test_op", |_| {
                attempts += 1;
                async { Err(TestError { transient: false }) }
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 4);
        assert_eq!(attempts, 4);
    }

    #[tokio::test]
    async fn test_transient_only_fails_fast() {
        let policy = RetryPolicy::immediate(5).with_retry_on(RetryOn::TransientOnly);
        let mut attempts = 0;
        let result: Result<(), _> = execute_with_policy(&policy, "test_op", |_| {
            attempts += 1;
            async { Err(TestError { transient: false }) }
        })
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let mut attempts = 0;
        let result = execute_with_policy(&RetryPolicy::immediate(0), "test_op", |_| {
            attempts += 1;
            async { Ok::<_, TestError>("done") }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts, 1);
    }
}
