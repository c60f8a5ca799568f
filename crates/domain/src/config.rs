//! Dispatcher configuration
//!
//! Every field has a default so partial files and environment overrides
//! compose. Durations are expressed in milliseconds on the wire.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_SWEEP_INTERVAL_MS, DEFAULT_CACHE_TTL_MS, DEFAULT_CIRCUIT_SWEEP_INTERVAL_MS,
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_MAX_BODY_BYTES, DEFAULT_METRICS_CAPACITY,
    DEFAULT_QUEUE_DELAY_MS, DEFAULT_RATE_LIMIT_MAX_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW_MS,
    DEFAULT_RESET_TIMEOUT_MS, DEFAULT_RETRIES, DEFAULT_RETRY_INITIAL_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_RETRY_MULTIPLIER, DEFAULT_TIMEOUT_MS,
};
use crate::errors::ConfigError;
use crate::impl_config_enum_conversions;
use crate::types::RateLimit;
use crate::utils::serde::{duration_millis, option_duration_millis};

/// How a rate window counts requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStrategy {
    /// Counter that resets when the window elapses
    #[default]
    FixedWindow,
    /// Timestamp log of the requests inside the trailing window
    SlidingLog,
}

impl_config_enum_conversions!(WindowStrategy {
    FixedWindow => "fixed_window",
    SlidingLog => "sliding_log",
});

/// What happens to a request arriving at a full window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait in the per-dispatcher FIFO queue; nothing is dropped
    #[default]
    Queue,
    /// Fail fast with `RATE_LIMIT_ERROR` (deprecated)
    Reject,
}

impl_config_enum_conversions!(OverflowPolicy {
    Queue => "queue",
    Reject => "reject",
});

/// Backoff between retry attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
    pub multiplier: f64,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_RETRY_INITIAL_DELAY_MS),
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

/// Per-endpoint circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitSettings {
    pub failure_threshold: u32,
    #[serde(with = "duration_millis")]
    pub reset_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub sweep_interval: Duration,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: Duration::from_millis(DEFAULT_RESET_TIMEOUT_MS),
            sweep_interval: Duration::from_millis(DEFAULT_CIRCUIT_SWEEP_INTERVAL_MS),
        }
    }
}

/// Default per-endpoint rate limit and queue behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    #[serde(with = "duration_millis")]
    pub window: Duration,
    /// Pause the drain worker takes after each queued request completes
    #[serde(with = "duration_millis")]
    pub queue_delay: Duration,
    pub strategy: WindowStrategy,
    pub overflow: OverflowPolicy,
}

impl RateLimitSettings {
    pub fn limit(&self) -> RateLimit {
        RateLimit::new(self.max_requests, self.window)
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
            queue_delay: Duration::from_millis(DEFAULT_QUEUE_DELAY_MS),
            strategy: WindowStrategy::default(),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(with = "duration_millis")]
    pub default_ttl: Duration,
    /// Oldest entry is evicted once the bound is reached (`None` = unbounded)
    pub max_entries: Option<usize>,
    #[serde(with = "duration_millis")]
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            max_entries: None,
            sweep_interval: Duration::from_millis(DEFAULT_CACHE_SWEEP_INTERVAL_MS),
        }
    }
}

/// Top-level configuration for one dispatcher instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Absolute base URL every request path is joined onto
    pub base_url: String,
    /// Per-attempt deadline (`0` disables it)
    #[serde(with = "duration_millis")]
    pub default_timeout: Duration,
    /// Retry budget for reads; writes default to zero
    pub default_retries: u32,
    pub max_body_bytes: usize,
    /// Unwrap `{data, message?}` envelopes before decoding
    pub unwrap_envelope: bool,
    /// Headers sent with every request unless the call overrides them
    pub default_headers: BTreeMap<String, String>,
    pub retry: RetrySettings,
    pub circuit: CircuitSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub metrics_capacity: usize,
    /// Overall deadline for `health_check()` (falls back to `default_timeout`)
    #[serde(with = "option_duration_millis")]
    pub health_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            default_retries: DEFAULT_RETRIES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            unwrap_envelope: true,
            default_headers: BTreeMap::new(),
            retry: RetrySettings::default(),
            circuit: CircuitSettings::default(),
            rate_limit: RateLimitSettings::default(),
            cache: CacheSettings::default(),
            metrics_capacity: DEFAULT_METRICS_CAPACITY,
            health_timeout: None,
        }
    }
}

impl DispatcherConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// Check invariants the dispatcher relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::Missing("base_url".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::invalid("base_url", "must start with http:// or https://"));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::invalid("max_body_bytes", "must be greater than 0"));
        }
        if self.metrics_capacity == 0 {
            return Err(ConfigError::invalid("metrics_capacity", "must be greater than 0"));
        }

        if self.retry.multiplier < 1.0 || !self.retry.multiplier.is_finite() {
            return Err(ConfigError::invalid("retry.multiplier", "must be a finite value >= 1.0"));
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return Err(ConfigError::invalid(
                "retry.max_delay",
                "must be greater than or equal to retry.initial_delay",
            ));
        }

        if self.circuit.failure_threshold == 0 {
            return Err(ConfigError::invalid("circuit.failure_threshold", "must be greater than 0"));
        }
        if self.circuit.reset_timeout.is_zero() {
            return Err(ConfigError::invalid("circuit.reset_timeout", "must be greater than 0"));
        }
        if self.circuit.sweep_interval.is_zero() {
            return Err(ConfigError::invalid("circuit.sweep_interval", "must be greater than 0"));
        }

        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::invalid("rate_limit.max_requests", "must be greater than 0"));
        }
        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::invalid("rate_limit.window", "must be greater than 0"));
        }

        if self.cache.sweep_interval.is_zero() {
            return Err(ConfigError::invalid("cache.sweep_interval", "must be greater than 0"));
        }
        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::invalid("cache.max_entries", "must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.circuit.failure_threshold, 5);
        assert_eq!(config.circuit.reset_timeout, Duration::from_secs(60));
        assert_eq!(config.rate_limit.queue_delay, Duration::from_millis(100));
        assert_eq!(config.rate_limit.overflow, OverflowPolicy::Queue);
        assert_eq!(config.rate_limit.strategy, WindowStrategy::FixedWindow);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: DispatcherConfig = serde_json::from_str(
            r#"{
                "base_url": "https://api.example.com",
                "circuit": { "failure_threshold": 2 },
                "rate_limit": { "strategy": "sliding_log", "window": 500 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.circuit.failure_threshold, 2);
        assert_eq!(config.circuit.reset_timeout, Duration::from_secs(60));
        assert_eq!(config.rate_limit.strategy, WindowStrategy::SlidingLog);
        assert_eq!(config.rate_limit.window, Duration::from_millis(500));
        assert_eq!(config.rate_limit.max_requests, 100);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = DispatcherConfig::new("ftp://example.com");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { ref field, .. }) if field == "base_url"));

        config.base_url = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        let mut config = DispatcherConfig::default();
        config.rate_limit.max_requests = 0;
        assert!(config.validate().is_err());

        let mut config = DispatcherConfig::default();
        config.retry.max_delay = Duration::from_millis(10);
        assert!(config.validate().is_err());

        let mut config = DispatcherConfig::default();
        config.cache.max_entries = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn enums_parse_from_env_style_strings() {
        assert_eq!("SLIDING_LOG".parse::<WindowStrategy>().unwrap(), WindowStrategy::SlidingLog);
        assert_eq!("reject".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Reject);
        assert!("drop".parse::<OverflowPolicy>().is_err());
    }
}
