//! Generic building blocks shared across Courier crates.
//!
//! Nothing here knows about HTTP: breakers, rate windows and caches are keyed
//! by opaque strings, and retry is generic over the error type.
//!
//! - [`resilience`]: clock abstraction, per-endpoint circuit breakers and
//!   rate windows, bounded retry with exponential backoff
//! - [`cache`]: TTL response cache and cache key derivation
//! - [`error`]: configuration validation errors

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod error;
pub mod resilience;

pub use cache::{cache_key, CacheConfig, CacheStats, ResponseCache};
pub use error::{ConfigValidationError, ConfigValidationResult};
pub use resilience::{
    Admission, BackoffStrategy, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitOpen,
    CircuitSnapshot, CircuitState, Clock, ExponentialBackoff, MockClock, Quota, RateLimitInfo,
    RateLimiterRegistry, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryOutcome,
    RetryPolicy, RetryResult, SharedClock, SystemClock, TokioClock, WindowStrategy,
};
