use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use super::StrategyError;

/// The sliding-window budget of a [`RateLimit`] is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
#[display("Rate limit exceeded: more than {max_requests} requests in {window:?}")]
pub struct RateLimitExceeded {
    /// Configured budget.
    pub max_requests: usize,
    /// Configured window.
    pub window: Duration,
    /// Time until the oldest request leaves the window.
    pub retry_after: Duration,
}

/// Sliding-window request counter.
///
/// Every recorded request stays in the window for `window`; at most
/// `max_requests` may be in the window at any time.
#[derive(Debug)]
pub struct RateLimit {
    max_requests: usize,
    window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimit {
    /// Creates a limiter allowing `max_requests` per `window`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidRateLimit`] for a zero budget or an empty window.
    pub fn new(max_requests: usize, window: Duration) -> Result<Self, StrategyError> {
        if max_requests == 0 {
            return Err(StrategyError::InvalidRateLimit {
                reason: "max requests must be positive".to_string(),
            });
        }
        if window.is_zero() {
            return Err(StrategyError::InvalidRateLimit {
                reason: "time window must be positive".to_string(),
            });
        }
        Ok(Self {
            max_requests,
            window,
            requests: Mutex::new(VecDeque::with_capacity(max_requests)),
        })
    }

    /// Configured budget.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, requests: &mut VecDeque<Instant>, now: Instant) {
        while requests
            .front()
            .is_some_and(|&sent| now.duration_since(sent) >= self.window)
        {
            requests.pop_front();
        }
    }

    /// `true` when another request would exceed the budget.
    pub fn is_rate_limited(&self) -> bool {
        let mut requests = self.lock();
        self.prune(&mut requests, Instant::now());
        requests.len() >= self.max_requests
    }

    /// Records a request at the current instant.
    pub fn add_request(&self) {
        self.lock().push_back(Instant::now());
    }

    /// Records a request if the budget allows it.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] without recording anything when the budget is exhausted.
    pub fn check(&self) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut requests = self.lock();
        self.prune(&mut requests, now);

        if requests.len() >= self.max_requests {
            let retry_after = requests
                .front()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or_default();
            warn!(max_requests = self.max_requests, ?retry_after, "rate limit exceeded");
            return Err(RateLimitExceeded {
                max_requests: self.max_requests,
                window: self.window,
                retry_after,
            });
        }

        requests.push_back(now);
        Ok(())
    }

    /// Forgets every recorded request.
    pub fn reset(&self) {
        self.lock().clear();
    }
}
