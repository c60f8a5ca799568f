//! Resilience patterns for per-endpoint fault isolation
//!
//! This module provides the generic building blocks the dispatcher composes:
//! - **Circuit Breaker**: stops calling an endpoint after repeated failures
//!   and probes it again after a reset timeout
//! - **Rate Limiter**: counts requests per endpoint in fixed or sliding
//!   windows
//! - **Retry Logic**: bounded re-attempts with exponential backoff
//!
//! Everything here is keyed by an opaque endpoint string and reads time
//! through [`Clock`], so the same types work against real time, tokio's
//! paused clock, or a hand-driven [`MockClock`].

pub mod circuit_breaker;
pub mod clock;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{
    Admission, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerRegistry,
    CircuitOpen, CircuitSnapshot, CircuitState,
};
pub use clock::{deadline_after, Clock, MockClock, SharedClock, SystemClock, TokioClock};
pub use rate_limiter::{Quota, RateLimitInfo, RateLimiterRegistry, WindowStrategy};
pub use retry::{
    policies, BackoffStrategy, ExponentialBackoff, RetryConfig, RetryConfigBuilder,
    RetryDecision, RetryError, RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
