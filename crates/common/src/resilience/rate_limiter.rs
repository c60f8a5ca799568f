//! Per-endpoint request windows
//!
//! Two counting strategies are supported:
//! - **Fixed window**: a counter that resets once the window elapses
//! - **Sliding log**: timestamps of the requests inside the trailing window
//!
//! The registry only counts and answers questions. Waiting for capacity is
//! the caller's job (see the dispatcher's overflow queue).

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use super::clock::{deadline_after, Clock, SharedClock, SystemClock};
use crate::error::{ConfigValidationError, ConfigValidationResult};

/// Maximum number of requests per window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quota {
    pub max_requests: u32,
    pub window: Duration,
}

impl Quota {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window }
    }

    /// Validate the quota
    pub fn validate(&self) -> ConfigValidationResult<()> {
        if self.max_requests == 0 {
            return Err(ConfigValidationError::new("max_requests must be greater than 0"));
        }
        if self.window.is_zero() {
            return Err(ConfigValidationError::new("window must be greater than 0"));
        }
        Ok(())
    }
}

/// Window counting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowStrategy {
    #[default]
    FixedWindow,
    SlidingLog,
}

/// Remaining capacity for an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Wall-clock time (epoch milliseconds) at which the next slot frees up
    pub reset_at_ms: u64,
    /// Time until at least one more request is admitted (zero if available)
    #[serde(rename = "reset_in_ms", serialize_with = "serialize_millis")]
    pub reset_in: Duration,
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

#[derive(Debug)]
enum RateWindow {
    Fixed { count: u32, reset_at: Instant },
    Sliding { log: VecDeque<Instant> },
}

impl RateWindow {
    fn new(strategy: WindowStrategy, now: Instant, window: Duration) -> Self {
        match strategy {
            WindowStrategy::FixedWindow => {
                Self::Fixed { count: 0, reset_at: deadline_after(now, window) }
            }
            WindowStrategy::SlidingLog => Self::Sliding { log: VecDeque::new() },
        }
    }

    /// Drop counts that fell out of the window
    fn roll(&mut self, now: Instant, window: Duration) {
        match self {
            Self::Fixed { count, reset_at } => {
                if now >= *reset_at {
                    *count = 0;
                    *reset_at = deadline_after(now, window);
                }
            }
            Self::Sliding { log } => {
                while log.front().is_some_and(|at| now.saturating_duration_since(*at) >= window) {
                    log.pop_front();
                }
            }
        }
    }

    fn used(&self) -> u32 {
        match self {
            Self::Fixed { count, .. } => *count,
            Self::Sliding { log } => log.len() as u32,
        }
    }

    fn record(&mut self, now: Instant) {
        match self {
            Self::Fixed { count, .. } => *count += 1,
            Self::Sliding { log } => log.push_back(now),
        }
    }

    fn wait_time(&self, now: Instant, quota: &Quota) -> Duration {
        if self.used() < quota.max_requests {
            return Duration::ZERO;
        }
        match self {
            Self::Fixed { reset_at, .. } => reset_at.saturating_duration_since(now),
            Self::Sliding { log } => {
                // The request that frees a slot is the one `max_requests` back
                // from the newest entry.
                let index = log.len().saturating_sub(quota.max_requests as usize);
                log.get(index)
                    .map(|at| deadline_after(*at, quota.window).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO)
            }
        }
    }
}

/// Registry of rate windows keyed by endpoint
pub struct RateLimiterRegistry {
    strategy: WindowStrategy,
    windows: DashMap<String, RateWindow>,
    clock: SharedClock,
}

impl fmt::Debug for RateLimiterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiterRegistry")
            .field("strategy", &self.strategy)
            .field("endpoints", &self.windows.len())
            .finish()
    }
}

impl RateLimiterRegistry {
    pub fn new(strategy: WindowStrategy) -> Self {
        Self::with_clock(strategy, Arc::new(SystemClock))
    }

    /// Create a registry with a custom clock (useful for testing)
    pub fn with_clock(strategy: WindowStrategy, clock: SharedClock) -> Self {
        Self { strategy, windows: DashMap::new(), clock }
    }

    pub fn strategy(&self) -> WindowStrategy {
        self.strategy
    }

    /// Atomically check capacity and record the request if admitted
    pub fn try_acquire(&self, endpoint: &str, quota: &Quota) -> bool {
        let now = self.clock.now();
        let mut window = self
            .windows
            .entry(endpoint.to_string())
            .or_insert_with(|| RateWindow::new(self.strategy, now, quota.window));

        window.roll(now, quota.window);
        if window.used() < quota.max_requests {
            window.record(now);
            true
        } else {
            debug!(endpoint, limit = quota.max_requests, "rate window full");
            false
        }
    }

    /// Whether a request issued now would have to wait
    pub fn should_queue(&self, endpoint: &str, quota: &Quota) -> bool {
        !self.time_until_available(endpoint, quota).is_zero()
    }

    /// How long until the window admits another request
    pub fn time_until_available(&self, endpoint: &str, quota: &Quota) -> Duration {
        let now = self.clock.now();
        match self.windows.get_mut(endpoint) {
            Some(mut window) => {
                window.roll(now, quota.window);
                window.wait_time(now, quota)
            }
            None => Duration::ZERO,
        }
    }

    pub fn info(&self, endpoint: &str, quota: &Quota) -> RateLimitInfo {
        let now = self.clock.now();
        let (used, reset_in) = match self.windows.get_mut(endpoint) {
            Some(mut window) => {
                window.roll(now, quota.window);
                (window.used(), window.wait_time(now, quota))
            }
            None => (0, Duration::ZERO),
        };

        RateLimitInfo {
            limit: quota.max_requests,
            remaining: quota.max_requests.saturating_sub(used),
            reset_at_ms: self.clock.millis_since_epoch().saturating_add(reset_in.as_millis() as u64),
            reset_in,
        }
    }

    pub fn reset(&self, endpoint: &str) {
        self.windows.remove(endpoint);
    }

    pub fn clear(&self) {
        self.windows.clear();
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.windows.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(WindowStrategy::default())
    }
}
