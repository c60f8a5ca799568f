//! Per-endpoint circuit breakers
//!
//! Each endpoint key gets its own breaker, created lazily on first use and
//! kept for the lifetime of the registry. State changes happen inside short
//! synchronous critical sections on the endpoint's map entry, never across an
//! `.await`.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, SharedClock, SystemClock};
use crate::error::{ConfigValidationError, ConfigValidationResult};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit admits a single probe to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait after the last failure before admitting a probe
    pub reset_timeout: Duration,
    /// Whether a success in the closed state clears the failure count
    pub reset_on_success: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(60), reset_on_success: true }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigValidationResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigValidationError::new("failure_threshold must be greater than 0"));
        }
        if self.reset_timeout.is_zero() {
            return Err(ConfigValidationError::new("reset_timeout must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    pub fn reset_on_success(mut self, reset: bool) -> Self {
        self.config.reset_on_success = reset;
        self
    }

    pub fn build(self) -> ConfigValidationResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Rejection returned by [`CircuitBreakerRegistry::check`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit open for {endpoint}, retry after {retry_after:?}")]
pub struct CircuitOpen {
    pub endpoint: String,
    /// Time left until a probe may be admitted (zero while a probe runs)
    pub retry_after: Duration,
}

/// How a call was let through the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed; ordinary call
    Normal,
    /// Circuit half-open; this call is the single recovery probe and must
    /// end in `record_success`, `record_failure` or `release_probe`
    Probe,
}

/// Point-in-time view of one endpoint's breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub endpoint: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub probe_in_flight: bool,
    /// Milliseconds since the last recorded failure
    pub since_last_failure_ms: Option<u64>,
    pub total_rejections: u64,
}

#[derive(Debug, Clone)]
struct CircuitEntry {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
    total_rejections: u64,
}

impl CircuitEntry {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            probe_in_flight: false,
            total_rejections: 0,
        }
    }

    fn open_elapsed(&self, now: Instant) -> Duration {
        self.last_failure.map(|at| now.saturating_duration_since(at)).unwrap_or(Duration::MAX)
    }
}

/// Registry of circuit breakers keyed by endpoint
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    circuits: DashMap<String, CircuitEntry>,
    clock: SharedClock,
}

impl fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("config", &self.config)
            .field("endpoints", &self.circuits.len())
            .finish()
    }
}

impl CircuitBreakerRegistry {
    /// Create a registry using the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigValidationResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a registry with a custom clock (useful for testing)
    pub fn with_clock(
        config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> ConfigValidationResult<Self> {
        config.validate()?;
        Ok(Self { config, circuits: DashMap::new(), clock })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Decide whether a call to `endpoint` may proceed
    ///
    /// An open circuit whose reset timeout has elapsed moves to half-open
    /// here and the caller becomes the probe. While the probe is running
    /// every other call is rejected.
    pub fn check(&self, endpoint: &str) -> Result<Admission, CircuitOpen> {
        let now = self.clock.now();
        let mut entry =
            self.circuits.entry(endpoint.to_string()).or_insert_with(CircuitEntry::new);

        match entry.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = entry.open_elapsed(now);
                if elapsed >= self.config.reset_timeout {
                    entry.state = CircuitState::HalfOpen;
                    entry.probe_in_flight = true;
                    info!(endpoint, "circuit half-open, admitting probe");
                    Ok(Admission::Probe)
                } else {
                    entry.total_rejections += 1;
                    let retry_after = self.config.reset_timeout.saturating_sub(elapsed);
                    debug!(endpoint, ?retry_after, "circuit open, rejecting call");
                    Err(CircuitOpen { endpoint: endpoint.to_string(), retry_after })
                }
            }
            CircuitState::HalfOpen => {
                if entry.probe_in_flight {
                    entry.total_rejections += 1;
                    debug!(endpoint, "probe in flight, rejecting call");
                    Err(CircuitOpen { endpoint: endpoint.to_string(), retry_after: Duration::ZERO })
                } else {
                    entry.probe_in_flight = true;
                    Ok(Admission::Probe)
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self, endpoint: &str) {
        let Some(mut entry) = self.circuits.get_mut(endpoint) else {
            return;
        };

        match entry.state {
            CircuitState::Closed => {
                if self.config.reset_on_success {
                    entry.failure_count = 0;
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Closed;
                entry.failure_count = 0;
                entry.probe_in_flight = false;
                info!(endpoint, "circuit closed after successful probe");
            }
            CircuitState::Open => {
                debug!(endpoint, "ignoring late success while circuit is open");
            }
        }
    }

    /// Record a failed call that counts against the endpoint
    pub fn record_failure(&self, endpoint: &str) {
        let now = self.clock.now();
        let mut entry =
            self.circuits.entry(endpoint.to_string()).or_insert_with(CircuitEntry::new);

        entry.failure_count = entry.failure_count.saturating_add(1);
        entry.last_failure = Some(now);

        match entry.state {
            CircuitState::Closed => {
                if entry.failure_count >= self.config.failure_threshold {
                    entry.state = CircuitState::Open;
                    warn!(
                        endpoint,
                        failures = entry.failure_count,
                        "circuit opened after reaching failure threshold"
                    );
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.probe_in_flight = false;
                warn!(endpoint, "circuit re-opened after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    /// Release a probe that finished without a network verdict
    ///
    /// Used when the admitted call was answered from cache or aborted before
    /// reaching the remote, so the next caller may probe instead.
    pub fn release_probe(&self, endpoint: &str) {
        if let Some(mut entry) = self.circuits.get_mut(endpoint) {
            if entry.state == CircuitState::HalfOpen {
                entry.probe_in_flight = false;
            }
        }
    }

    /// Move every open circuit whose reset timeout elapsed to half-open
    ///
    /// Returns the number of circuits transitioned.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut transitioned = 0;

        for mut entry in self.circuits.iter_mut() {
            if entry.state == CircuitState::Open
                && entry.open_elapsed(now) >= self.config.reset_timeout
            {
                entry.state = CircuitState::HalfOpen;
                entry.probe_in_flight = false;
                transitioned += 1;
                debug!(endpoint = %entry.key(), "sweep moved circuit to half-open");
            }
        }

        transitioned
    }

    /// Current state (`Closed` for endpoints never seen)
    pub fn state(&self, endpoint: &str) -> CircuitState {
        self.circuits.get(endpoint).map(|entry| entry.state).unwrap_or(CircuitState::Closed)
    }

    pub fn snapshot(&self, endpoint: &str) -> Option<CircuitSnapshot> {
        let now = self.clock.now();
        self.circuits.get(endpoint).map(|entry| Self::to_snapshot(endpoint, &entry, now))
    }

    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let now = self.clock.now();
        let mut snapshots: Vec<_> = self
            .circuits
            .iter()
            .map(|entry| Self::to_snapshot(entry.key(), entry.value(), now))
            .collect();
        snapshots.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        snapshots
    }

    /// Reset one endpoint to closed with no failures
    pub fn reset(&self, endpoint: &str) {
        if self.circuits.remove(endpoint).is_some() {
            info!(endpoint, "circuit manually reset");
        }
    }

    pub fn reset_all(&self) {
        self.circuits.clear();
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.circuits.iter().map(|entry| entry.key().clone()).collect()
    }

    fn to_snapshot(endpoint: &str, entry: &CircuitEntry, now: Instant) -> CircuitSnapshot {
        CircuitSnapshot {
            endpoint: endpoint.to_string(),
            state: entry.state,
            failure_count: entry.failure_count,
            probe_in_flight: entry.probe_in_flight,
            since_last_failure_ms: entry
                .last_failure
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            total_rejections: entry.total_rejections,
        }
    }
}
