//! Dispatcher defaults
//!
//! Centralized location for the values `DispatcherConfig::default()` uses.

// Network
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const HEALTH_CHECK_PATH: &str = "/health";
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

// Retry backoff
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

// Circuit breaker
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_CIRCUIT_SWEEP_INTERVAL_MS: u64 = 30_000;

// Rate limiting
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_QUEUE_DELAY_MS: u64 = 100;

// Cache
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_CACHE_SWEEP_INTERVAL_MS: u64 = 60_000;

// Monitoring
pub const DEFAULT_METRICS_CAPACITY: usize = 1_000;

// Headers
pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_COOKIE: &str = "csrf_token";
