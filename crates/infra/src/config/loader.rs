//! Configuration loader
//!
//! Loads dispatcher configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `COURIER_BASE_URL` is not set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `COURIER_BASE_URL`: Base URL (required for the environment source)
//! - `COURIER_TIMEOUT_MS`: Per-attempt timeout in milliseconds
//! - `COURIER_RETRIES`: Default retry budget for reads
//! - `COURIER_FAILURE_THRESHOLD`: Failures before a circuit opens
//! - `COURIER_RESET_TIMEOUT_MS`: Open-circuit cool-down in milliseconds
//! - `COURIER_RATE_LIMIT_MAX`: Requests per window
//! - `COURIER_RATE_LIMIT_WINDOW_MS`: Window length in milliseconds
//! - `COURIER_RATE_LIMIT_STRATEGY`: `fixed_window` or `sliding_log`
//! - `COURIER_RATE_LIMIT_OVERFLOW`: `queue` or `reject`
//! - `COURIER_CACHE_TTL_MS`: Default cache TTL in milliseconds
//! - `COURIER_UNWRAP_ENVELOPE`: Whether `{data, message}` envelopes are
//!   unwrapped (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./courier.toml` or `./courier.json` (current working directory)
//! 2. `../courier.toml` or `../courier.json` (parent directory)
//! 3. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use courier_domain::{ConfigError, DispatcherConfig, OverflowPolicy, WindowStrategy};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the base URL is
/// not set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `ConfigError` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value fails validation
pub fn load() -> Result<DispatcherConfig, ConfigError> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(ConfigError::Missing(var)) => {
            tracing::debug!(missing = %var, "Environment incomplete, trying file");
            load_from_file(None)
        }
        Err(e) => Err(e),
    }
}

/// Load configuration from environment variables
///
/// `COURIER_BASE_URL` is required; every other variable overrides the
/// corresponding default when set.
///
/// # Errors
/// Returns `ConfigError::Missing` if the base URL is not set and
/// `ConfigError::Invalid` if a variable cannot be parsed.
pub fn load_from_env() -> Result<DispatcherConfig, ConfigError> {
    let mut config = DispatcherConfig::new(env_var("COURIER_BASE_URL")?);

    if let Some(ms) = env_parse::<u64>("COURIER_TIMEOUT_MS")? {
        config.default_timeout = Duration::from_millis(ms);
    }
    if let Some(retries) = env_parse::<u32>("COURIER_RETRIES")? {
        config.default_retries = retries;
    }
    if let Some(threshold) = env_parse::<u32>("COURIER_FAILURE_THRESHOLD")? {
        config.circuit.failure_threshold = threshold;
    }
    if let Some(ms) = env_parse::<u64>("COURIER_RESET_TIMEOUT_MS")? {
        config.circuit.reset_timeout = Duration::from_millis(ms);
    }
    if let Some(max) = env_parse::<u32>("COURIER_RATE_LIMIT_MAX")? {
        config.rate_limit.max_requests = max;
    }
    if let Some(ms) = env_parse::<u64>("COURIER_RATE_LIMIT_WINDOW_MS")? {
        config.rate_limit.window = Duration::from_millis(ms);
    }
    if let Ok(strategy) = std::env::var("COURIER_RATE_LIMIT_STRATEGY") {
        config.rate_limit.strategy = WindowStrategy::from_str(&strategy)?;
    }
    if let Ok(overflow) = std::env::var("COURIER_RATE_LIMIT_OVERFLOW") {
        config.rate_limit.overflow = OverflowPolicy::from_str(&overflow)?;
    }
    if let Some(ms) = env_parse::<u64>("COURIER_CACHE_TTL_MS")? {
        config.cache.default_ttl = Duration::from_millis(ms);
    }
    config.unwrap_envelope = env_bool("COURIER_UNWRAP_ENVELOPE", config.unwrap_envelope);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// # Arguments
/// * `path` - Optional explicit path. If `None`, probes standard locations.
///
/// # Errors
/// Returns `ConfigError` if:
/// - File not found (when path is `Some`)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<DispatcherConfig, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::Missing(format!("config file {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConfigError::Missing("no config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)?;
    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`). Missing fields
/// take their defaults.
///
/// # Errors
/// Returns `ConfigError::Format` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<DispatcherConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Format { format: "TOML".into(), message: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Format { format: "JSON".into(), message: e.to_string() }),
        other => Err(ConfigError::Format {
            format: other.to_string(),
            message: "unsupported config format".into(),
        }),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] =
        ["courier.toml", "courier.json", "../courier.toml", "../courier.json"];

    let mut candidates = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

/// Parse an optional numeric environment variable
fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, format!("{raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
