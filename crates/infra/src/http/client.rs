use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use courier_domain::constants::DEFAULT_USER_AGENT;
use courier_domain::HttpMethod;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use tracing::debug;

use super::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// [`Transport`] backed by a shared `reqwest` client.
///
/// Performs exactly one attempt per call. Retries, deadlines and breaker
/// bookkeeping live in the dispatcher.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest { method, url, headers, body } = request;

        let mut builder = self.client.request(to_reqwest_method(method), url.clone());
        builder = builder.headers(to_header_map(&headers)?);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        debug!(%method, %url, "sending HTTP request");
        let response = builder.send().await.map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

        debug!(%method, %url, status, bytes = body.len(), "received HTTP response");
        Ok(TransportResponse { status, headers, body })
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Option<Duration>,
    connect_timeout: Duration,
    user_agent: String,
    default_headers: BTreeMap<String, String>,
    accept_invalid_certs: bool,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: BTreeMap::new(),
            accept_invalid_certs: false,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Hard upper bound for a single exchange, on top of the dispatcher's
    /// per-attempt deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn default_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn default_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        for (name, value) in headers {
            self.default_headers.insert(name.to_ascii_lowercase(), value);
        }
        self
    }

    /// Test-only helper to allow insecure TLS (e.g., self-signed certs).
    #[cfg(test)]
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let mut builder = ReqwestClient::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent)
            .default_headers(to_header_map(&self.default_headers)?)
            .no_proxy();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(TransportError::from)?;
        Ok(ReqwestTransport { client })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| TransportError::other(format!("invalid header name {name:?}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| TransportError::other(format!("invalid value for {name}: {err}")))?;
        map.insert(name, value);
    }
    Ok(map)
}
