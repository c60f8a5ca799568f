//! Error types used throughout the dispatch layer
//!
//! Every failure a caller can observe is a [`DispatchError`] carrying one of
//! the closed set of [`ErrorCode`] kinds. The kind decides retryability and
//! whether the failure counts against an endpoint's circuit breaker.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Closed set of error kinds surfaced by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Transport failed before any HTTP response was received
    NetworkError,
    /// Attempt exceeded its deadline
    TimeoutError,
    /// Malformed request rejected before transmission (or 400/422 from the remote)
    ValidationError,
    /// 401
    AuthenticationError,
    /// 403
    AuthorizationError,
    /// 404
    NotFoundError,
    /// 429 from the remote, or the local limiter in reject mode
    RateLimitError,
    /// Endpoint is currently isolated by its circuit breaker
    CircuitOpenError,
    /// 5xx other than 503
    ServerError,
    /// 503
    ServiceUnavailableError,
    /// Response body could not be decoded
    UnknownResponseError,
    /// Any other 4xx
    ClientError,
}

impl ErrorCode {
    /// Classify an HTTP status code that is not a success
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::ValidationError,
            401 => Self::AuthenticationError,
            403 => Self::AuthorizationError,
            404 => Self::NotFoundError,
            429 => Self::RateLimitError,
            503 => Self::ServiceUnavailableError,
            500..=599 => Self::ServerError,
            400..=499 => Self::ClientError,
            _ => Self::UnknownResponseError,
        }
    }

    /// Stable wire name used in `to_json()` and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::AuthorizationError => "AUTHORIZATION_ERROR",
            Self::NotFoundError => "NOT_FOUND_ERROR",
            Self::RateLimitError => "RATE_LIMIT_ERROR",
            Self::CircuitOpenError => "CIRCUIT_OPEN_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::ServiceUnavailableError => "SERVICE_UNAVAILABLE_ERROR",
            Self::UnknownResponseError => "UNKNOWN_RESPONSE_ERROR",
            Self::ClientError => "CLIENT_ERROR",
        }
    }

    /// Whether a failed attempt of this kind may be re-attempted
    ///
    /// Only transport failures, timeouts and 5xx responses qualify. 4xx
    /// responses, validation failures and the local short-circuits never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError
                | Self::TimeoutError
                | Self::ServerError
                | Self::ServiceUnavailableError
        )
    }

    /// Whether a terminal failure of this kind counts against the endpoint's
    /// circuit breaker
    pub fn trips_circuit(&self) -> bool {
        matches!(
            self,
            Self::NetworkError
                | Self::TimeoutError
                | Self::ServerError
                | Self::ServiceUnavailableError
                | Self::RateLimitError
                | Self::UnknownResponseError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure of a dispatched request
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct DispatchError {
    pub message: String,
    pub status_code: Option<u16>,
    pub code: ErrorCode,
    pub details: Option<Value>,
}

impl DispatchError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { message: message.into(), status_code: None, code, details: None }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn timeout(after_ms: u64) -> Self {
        Self::new(ErrorCode::TimeoutError, format!("request timed out after {after_ms}ms"))
            .with_details(json!({ "timeoutMs": after_ms }))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn circuit_open(endpoint: &str, retry_after_ms: u64) -> Self {
        Self::new(ErrorCode::CircuitOpenError, format!("circuit open for {endpoint}"))
            .with_details(json!({ "endpoint": endpoint, "retryAfterMs": retry_after_ms }))
    }

    pub fn rate_limited(endpoint: &str, reset_in_ms: u64) -> Self {
        Self::new(ErrorCode::RateLimitError, format!("rate limit exceeded for {endpoint}"))
            .with_details(json!({ "endpoint": endpoint, "resetInMs": reset_in_ms }))
    }

    pub fn unknown_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownResponseError, message)
    }

    /// Build a classified error from a non-success HTTP response
    ///
    /// The message is taken from a JSON body (`message`, `error`,
    /// `error.message`) when present, otherwise from the raw text. A
    /// `Retry-After` header is preserved in the details.
    pub fn from_response(status: u16, headers: &BTreeMap<String, String>, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).into_owned();
        let parsed = serde_json::from_slice::<Value>(body).ok();

        let message = parsed
            .as_ref()
            .and_then(extract_message)
            .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
            .unwrap_or_else(|| format!("request failed with status {status}"));

        let mut details = match parsed {
            Some(Value::Object(map)) => Value::Object(map),
            Some(other) => json!({ "body": other }),
            None if text.is_empty() => json!({}),
            None => json!({ "body": text }),
        };

        if let Some(retry_after) = headers.get("retry-after") {
            if let Value::Object(map) = &mut details {
                map.insert("retryAfter".to_string(), Value::String(retry_after.clone()));
            }
        }

        let details = match &details {
            Value::Object(map) if map.is_empty() => None,
            _ => Some(details),
        };

        Self { message, status_code: Some(status), code: ErrorCode::from_status(status), details }
    }

    /// Predicate for branching on the error kind
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn trips_circuit(&self) -> bool {
        self.code.trips_circuit()
    }

    /// JSON representation `{message, statusCode, code, details}`
    pub fn to_json(&self) -> Value {
        json!({
            "message": self.message,
            "statusCode": self.status_code,
            "code": self.code.as_str(),
            "details": self.details,
        })
    }
}

fn extract_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    match body.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(error) => error.get("message").and_then(Value::as_str).map(str::to_string),
        None => None,
    }
}

/// Result type alias for dispatch operations
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {format} format: {message}")]
    Format { format: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid { field: field.into(), message: message.into() }
    }
}
