//! Error types shared by the building blocks in this crate

use thiserror::Error;

/// Invalid settings passed to a breaker, rate limiter, retry or cache config
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration: {message}")]
pub struct ConfigValidationError {
    pub message: String,
}

impl ConfigValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Result type for configuration validation
pub type ConfigValidationResult<T> = Result<T, ConfigValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_message() {
        let error = ConfigValidationError::new("window must be greater than 0");
        assert_eq!(error.to_string(), "Invalid configuration: window must be greater than 0");
    }
}
