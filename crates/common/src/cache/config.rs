//! Response cache configuration and builder

use std::time::Duration;

use crate::error::{ConfigValidationError, ConfigValidationResult};

/// Configuration for [`ResponseCache`](super::ResponseCache)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when a request does not set its own
    pub default_ttl: Duration,

    /// Maximum number of entries (None = unlimited); the oldest insertion is
    /// evicted first
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { default_ttl: Duration::from_secs(300), max_entries: None }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Quick preset for a TTL-only cache
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    ///
    /// use courier_common::cache::CacheConfig;
    ///
    /// let config = CacheConfig::ttl(Duration::from_secs(60));
    /// assert!(config.max_entries.is_none());
    /// ```
    pub fn ttl(duration: Duration) -> Self {
        Self { default_ttl: duration, max_entries: None }
    }

    pub fn validate(&self) -> ConfigValidationResult<()> {
        if self.max_entries == Some(0) {
            return Err(ConfigValidationError::new("max_entries must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    pub fn max_entries(mut self, max: usize) -> Self {
        self.config.max_entries = Some(max);
        self
    }

    pub fn build(self) -> ConfigValidationResult<CacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::config.
    use super::*;

    /// Validates the cache config builder scenario.
    ///
    /// Assertions:
    /// - Confirms builder values are applied.
    /// - Ensures `max_entries(0)` fails validation.
    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::builder()
            .default_ttl(Duration::from_secs(30))
            .max_entries(100)
            .build()
            .expect("valid config");

        assert_eq!(config.default_ttl, Duration::from_secs(30));
        assert_eq!(config.max_entries, Some(100));
        assert!(CacheConfig::builder().max_entries(0).build().is_err());
    }
}
