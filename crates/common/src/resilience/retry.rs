//! Bounded retry with exponential backoff
//!
//! The executor runs an explicit loop: one initial attempt plus at most
//! `max_retries` re-attempts. Whether a failure is re-attempted is up to the
//! [`RetryPolicy`]; how long to wait is up to the [`BackoffStrategy`]. The
//! last error is always handed back to the caller.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ConfigValidationError, ConfigValidationResult};

/// Errors that end a retry loop
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every permitted attempt failed; `source` is the last failure
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    Exhausted { attempts: u32, source: E },

    /// The policy refused to retry this failure
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { source: E },
}

impl<E> RetryError<E> {
    /// The error of the final attempt
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source } => source,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source } => source,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Outcome of a retry execution including result and summary statistics
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    pub attempts: u32,
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// `attempt` is the 1-indexed number of the attempt that just failed
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Exponential backoff: `initial_delay * multiplier^(n-1)` capped at
/// `max_delay` for the n-th retry
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ExponentialBackoff {
    /// Delay before the given 1-indexed retry
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay_ms = delay.min(self.max_delay.as_millis() as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Retry immediately
    None,
    /// Fixed delay between retries
    Fixed(Duration),
    Exponential(ExponentialBackoff),
}

impl BackoffStrategy {
    /// Calculate the delay before the given 1-indexed retry
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        match self {
            BackoffStrategy::None => Duration::ZERO,
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Exponential(backoff) => backoff.delay_for(retry),
        }
    }
}

/// Retry loop configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Re-attempts after the initial attempt
    pub max_retries: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, backoff: BackoffStrategy::Exponential(ExponentialBackoff::default()) }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigValidationResult<()> {
        if let BackoffStrategy::Exponential(backoff) = &self.backoff {
            if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
                return Err(ConfigValidationError::new("multiplier must be finite and >= 1.0"));
            }
            if backoff.max_delay < backoff.initial_delay {
                return Err(ConfigValidationError::new(
                    "max_delay must be greater than or equal to initial_delay",
                ));
            }
        }
        Ok(())
    }
}

/// Builder for RetryConfig
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn no_backoff(mut self) -> Self {
        self.config.backoff = BackoffStrategy::None;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff =
            BackoffStrategy::Exponential(ExponentialBackoff { initial_delay, multiplier, max_delay });
        self
    }

    pub fn build(self) -> ConfigValidationResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics
    ///
    /// The operation receives the 1-indexed attempt number.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut total_delay = Duration::ZERO;
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts, "executing operation");

            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retries");
                    }
                    return RetryOutcome { result: Ok(value), attempts: attempt, total_delay };
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(attempt, %error, "retry policy declined to retry");
                    return RetryOutcome {
                        result: Err(RetryError::NonRetryable { source: error }),
                        attempts: attempt,
                        total_delay,
                    };
                }
                _ if attempt >= max_attempts => {
                    warn!(attempts = attempt, %error, "all retry attempts exhausted");
                    return RetryOutcome {
                        result: Err(RetryError::Exhausted { attempts: attempt, source: error }),
                        attempts: attempt,
                        total_delay,
                    };
                }
                RetryDecision::Retry => self.config.backoff.calculate_delay(attempt),
                RetryDecision::RetryAfter(delay) => delay,
            };

            warn!(attempt, ?delay, %error, "operation failed, retrying");
            tokio::time::sleep(delay).await;
            total_delay += delay;
            attempt += 1;
        }
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::*;

    /// Predicate-based retry policy
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
