use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use super::StrategyError;

/// Errors that know whether re-attempting the operation may succeed.
pub trait Transient {
    /// `true` for connection and timeout failures.
    fn is_transient(&self) -> bool;
}

/// Re-attempts an operation with exponential backoff while it fails transiently.
///
/// Application-level failures (4xx/5xx responses, validation or token errors)
/// are never retried: only errors whose [`Transient::is_transient`] is `true` are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    max_retries: usize,
    min_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl RetryStrategy {
    /// A strategy that runs the operation exactly once.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Starts a builder with the default policy.
    pub fn builder() -> RetryStrategyBuilder {
        RetryStrategyBuilder::default()
    }

    /// Number of retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    fn backoff(&self) -> ExponentialBuilder {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);
        if self.jitter {
            backoff.with_jitter()
        } else {
            backoff
        }
    }

    /// Runs `operation`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once it is not transient or the retries are exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        if self.max_retries == 0 {
            return operation().await;
        }

        operation
            .retry(self.backoff())
            .when(|error: &E| error.is_transient())
            .notify(|error: &E, delay: Duration| {
                warn!(%error, ?delay, "transient failure, retrying");
            })
            .await
    }
}

/// Builder for [`RetryStrategy`].
#[derive(Debug, Clone, Default)]
pub struct RetryStrategyBuilder {
    strategy: RetryStrategy,
}

impl RetryStrategyBuilder {
    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.strategy.max_retries = max_retries;
        self
    }

    /// Sets the first backoff delay.
    #[must_use]
    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.strategy.min_delay = delay;
        self
    }

    /// Sets the upper bound of a backoff delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.strategy.max_delay = delay;
        self
    }

    /// Randomizes delays.
    #[must_use]
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.strategy.jitter = jitter;
        self
    }

    /// Validates and builds the strategy.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidRetry`] when `min_delay` exceeds `max_delay`.
    pub fn build(self) -> Result<RetryStrategy, StrategyError> {
        let RetryStrategy {
            min_delay,
            max_delay,
            ..
        } = self.strategy;
        if min_delay > max_delay {
            return Err(StrategyError::InvalidRetry {
                reason: format!("min delay {min_delay:?} is greater than max delay {max_delay:?}"),
            });
        }
        Ok(self.strategy)
    }
}
