//! Transport seam between the dispatcher and the network
//!
//! The dispatcher never talks to `reqwest` directly. It builds a
//! [`TransportRequest`], hands it to a [`Transport`] and classifies what comes
//! back, which keeps retry, timeout and breaker logic testable against an
//! in-memory implementation.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use courier_domain::HttpMethod;
use thiserror::Error;
use url::Url;

/// Fully resolved request ready to be written to the wire
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: Url,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    /// Serialized JSON body
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self { method, url, headers: BTreeMap::new(), body: None }
    }
}

/// Raw response as read from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a request failed before any HTTP response arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not establish a connection
    Connect,
    /// The transport's own deadline fired
    Timeout,
    /// Anything else (TLS, protocol, body read)
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Other => "transport",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }
}

/// Performs a single network attempt
///
/// Implementations must not retry; the dispatcher owns the retry loop and the
/// per-attempt deadline.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
