//! Outgoing request model and per-call options

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DispatchError;

/// HTTP methods the dispatcher exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Reads that may be served from the response cache
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Get)
    }

    /// Methods retried by default; everything else needs explicit `retries`
    pub fn is_idempotent_read(&self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(DispatchError::validation(format!("unsupported HTTP method: {s}"))),
        }
    }
}

/// Per-call rate limit override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_requests: u32,
    #[serde(with = "crate::utils::serde::duration_millis")]
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window }
    }
}

/// Options recognised on every call
///
/// `None` fields fall back to the dispatcher configuration. A `cache_ttl` of
/// zero makes the call a guaranteed cache miss; a `timeout` of zero disables
/// the per-attempt deadline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub should_cache: bool,
    #[serde(with = "crate::utils::serde::option_duration_millis")]
    pub cache_ttl: Option<Duration>,
    pub retries: Option<u32>,
    #[serde(with = "crate::utils::serde::option_duration_millis")]
    pub timeout: Option<Duration>,
    pub skip_rate_limit: bool,
    pub rate_limit: Option<RateLimit>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt this call into the response cache
    pub fn cached(mut self) -> Self {
        self.should_cache = true;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.should_cache = true;
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn skip_rate_limit(mut self) -> Self {
        self.skip_rate_limit = true;
        self
    }

    pub fn rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.rate_limit = Some(RateLimit::new(max_requests, window));
        self
    }
}

/// Metadata interceptors and the dispatcher attach to a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Stamped by the timing interceptor
    pub start_time: Option<DateTime<Utc>>,
    /// Number of network attempts made so far
    pub attempts: u32,
    /// Free-form values for collaborators
    pub extensions: BTreeMap<String, Value>,
}

/// A single outgoing call, owned by the dispatcher until it completes
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    /// Lower-cased header names; insertion replaces any previous value
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub options: RequestOptions,
    pub metadata: RequestMetadata,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
            options: RequestOptions::default(),
            metadata: RequestMetadata::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Path without its query string
    pub fn route(&self) -> &str {
        self.path.split(['?', '#']).next().unwrap_or(&self.path)
    }

    /// Identity used to partition circuit-breaker and rate-limiter state
    pub fn endpoint_key(&self) -> String {
        format!("{} {}", self.method, self.route())
    }

    /// Whether this call may be answered from or stored into the cache
    pub fn is_cache_eligible(&self) -> bool {
        self.method.is_cacheable() && self.options.should_cache
    }
}
