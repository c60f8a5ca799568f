//! Request dispatcher
//!
//! Every call walks the same pipeline:
//!
//! 1. validate the request and resolve its URL
//! 2. ask the endpoint's circuit breaker for admission
//! 3. take a rate window slot (immediately, after queueing, or fail fast)
//! 4. answer from the response cache when possible
//! 5. run the request interceptors
//! 6. call the transport inside the retry loop, each attempt under its own
//!    deadline
//! 7. settle the breaker, run the response interceptors, cache and record
//!
//! The endpoint key `"<METHOD> <route>"` scopes breakers, rate windows and
//! metrics, so `GET /users` and `POST /users` never share state.

mod builder;
mod maintenance;
mod queue;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use courier_common::cache::{cache_key, CacheStats, ResponseCache};
use courier_common::resilience::{
    policies::PredicateRetry, Admission, BackoffStrategy, CircuitBreakerRegistry,
    CircuitSnapshot, CircuitState, ExponentialBackoff, Quota, RateLimitInfo,
    RateLimiterRegistry, RetryConfig, RetryExecutor, WindowStrategy as CommonWindowStrategy,
};
use courier_domain::constants::HEALTH_CHECK_PATH;
use courier_domain::{
    ApiRequest, ApiResponse, DispatchError, DispatchResult, DispatcherConfig,
    OverflowPolicy, RateLimit, RequestOptions, ResponseMetadata, WindowStrategy,
};
use reqwest::header::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

pub use builder::DispatcherBuilder;
pub use maintenance::MaintenanceReport;
pub use queue::{RateAdmission, Turn};

use self::queue::RateLimitQueue;
use crate::http::{Transport, TransportRequest, TransportResponse};
use crate::interceptors::InterceptorPipeline;
use crate::observability::{MetricsBuffer, MetricsSummary, RequestRecord};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Result of [`Dispatcher::health_check`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// The health endpoint answered with a 2xx status
    pub reachable: bool,
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// Client-side request dispatcher
///
/// Owns one circuit breaker registry, rate limiter, overflow queue, response
/// cache and metrics buffer. Share it behind an `Arc`; every method takes
/// `&self`.
pub struct Dispatcher {
    config: DispatcherConfig,
    base_url: Url,
    transport: Arc<dyn Transport>,
    interceptors: InterceptorPipeline,
    circuits: Arc<CircuitBreakerRegistry>,
    limiter: Arc<RateLimiterRegistry>,
    queue: RateLimitQueue,
    cache: Arc<ResponseCache<ApiResponse>>,
    metrics: Arc<MetricsBuffer>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url.as_str())
            .field("interceptors", &self.interceptors)
            .field("circuits", &self.circuits)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// A validated request and the URL it resolves to
struct Prepared {
    request: ApiRequest,
    url: Url,
}

impl Dispatcher {
    /// Build a dispatcher with the default `reqwest` transport
    pub fn new(config: DispatcherConfig) -> Result<Self, courier_domain::ConfigError> {
        DispatcherBuilder::new(config).build()
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /* ---------------------------------------------------------------------- */
    /* Verb helpers */
    /* ---------------------------------------------------------------------- */

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> DispatchResult<T> {
        self.send(ApiRequest::get(path).options(options)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> DispatchResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::post(path).body(to_json(body)?).options(options)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> DispatchResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::put(path).body(to_json(body)?).options(options)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> DispatchResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::patch(path).body(to_json(body)?).options(options)).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> DispatchResult<T> {
        self.send(ApiRequest::delete(path).options(options)).await
    }

    /* ---------------------------------------------------------------------- */
    /* Dispatch */
    /* ---------------------------------------------------------------------- */

    /// Dispatch a request and decode its payload as `T`
    ///
    /// With `unwrap_envelope` on, a `{data, message?, success?, status?}`
    /// body is reduced to its `data` member first. A body that does not
    /// decode is recorded as a failed call.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> DispatchResult<T> {
        let unwrap_envelope = self.config.unwrap_envelope;
        self.observe(request, |response| decode(response, unwrap_envelope)).await
    }

    /// Dispatch a request and return the response without decoding
    pub async fn send_raw(&self, request: ApiRequest) -> DispatchResult<ApiResponse> {
        self.observe(request, Ok).await
    }

    /// Run the dispatch pipeline, then `finish`, and record the final outcome
    #[instrument(skip(self, request, finish), fields(method = %request.method, path = %request.path))]
    async fn observe<R, F>(&self, request: ApiRequest, finish: F) -> DispatchResult<R>
    where
        F: FnOnce(ApiResponse) -> DispatchResult<R> + Send,
    {
        let started = Instant::now();
        let method = request.method;
        let endpoint = request.endpoint_key();
        let mut attempts = 0;

        let result = self.dispatch(request, &endpoint, &mut attempts).await;
        let (status, from_cache) = match &result {
            Ok(response) => (Some(response.status), response.metadata.from_cache),
            Err(error) => (error.status_code, false),
        };
        let result = result.and_then(finish);
        let duration_ms = millis(started.elapsed());

        match &result {
            Ok(_) => debug!(
                endpoint = %endpoint,
                status = ?status,
                attempts,
                from_cache,
                duration_ms,
                "request completed"
            ),
            Err(error) => warn!(
                endpoint = %endpoint,
                code = %error.code,
                status = ?status,
                attempts,
                duration_ms,
                "request failed: {}",
                error.message
            ),
        }

        self.metrics.record(RequestRecord {
            endpoint,
            method,
            duration_ms,
            status,
            timestamp: Utc::now(),
            error: result.as_ref().err().map(|error| error.code),
            from_cache,
            attempts,
        });

        result
    }

    async fn dispatch(
        &self,
        request: ApiRequest,
        endpoint: &str,
        attempts: &mut u32,
    ) -> DispatchResult<ApiResponse> {
        let Prepared { request, url } = self.prepare(request)?;

        let admission = self.circuits.check(endpoint).map_err(|open| {
            DispatchError::circuit_open(&open.endpoint, millis(open.retry_after))
        })?;
        let guard = CircuitGuard::new(&self.circuits, endpoint, admission);

        let _turn = if request.options.skip_rate_limit {
            None
        } else {
            self.acquire_rate_slot(endpoint, &request.options).await?
        };

        let cache_ttl = request.options.cache_ttl.unwrap_or(self.cache.config().default_ttl);
        let cached_under = (request.is_cache_eligible() && !cache_ttl.is_zero()).then(|| {
            cache_key(request.method.as_str(), url.as_str(), request.body.as_ref(), &request.headers)
        });

        if let Some(key) = &cached_under {
            if let Some(mut cached) = self.cache.get(key) {
                debug!(endpoint, "served from cache");
                cached.metadata.from_cache = true;
                return Ok(cached);
            }
        }

        let mut request = self.interceptors.apply_request(request).await?;
        let transport_request = self.transport_request(&request, &url)?;

        let default_retries =
            if request.method.is_idempotent_read() { self.config.default_retries } else { 0 };
        let max_retries = request.options.retries.unwrap_or(default_retries);
        let deadline = request.options.timeout.unwrap_or(self.config.default_timeout);
        let executor = RetryExecutor::new(
            RetryConfig {
                max_retries,
                backoff: BackoffStrategy::Exponential(ExponentialBackoff {
                    initial_delay: self.config.retry.initial_delay,
                    multiplier: self.config.retry.multiplier,
                    max_delay: self.config.retry.max_delay,
                }),
            },
            PredicateRetry::new(|error: &DispatchError, _attempt: u32| error.is_retryable()),
        );

        let outcome = executor
            .execute_with_outcome(|_attempt| {
                let transport_request = transport_request.clone();
                async move { self.attempt(transport_request, deadline).await }
            })
            .await;
        *attempts = outcome.attempts;
        request.metadata.attempts = outcome.attempts;

        let (raw, data) = match outcome.result {
            Ok(success) => success,
            Err(error) => {
                let error = error.into_inner();
                if error.trips_circuit() {
                    guard.failed();
                } else {
                    guard.reachable();
                }
                return Err(error);
            }
        };
        guard.succeeded();

        let response = ApiResponse {
            status: raw.status,
            headers: raw.headers,
            data,
            metadata: ResponseMetadata {
                request: request.metadata,
                duration: None,
                from_cache: false,
                endpoint: endpoint.to_string(),
            },
        };
        let response = self.interceptors.apply_response(response).await?;

        if let Some(key) = cached_under {
            self.cache.set(key, response.clone(), cache_ttl);
        }

        Ok(response)
    }

    /// Validate a request and merge the default headers into it
    fn prepare(&self, mut request: ApiRequest) -> DispatchResult<Prepared> {
        if request.path.trim().is_empty() {
            return Err(DispatchError::validation("request path must not be empty"));
        }

        if let Some(limit) = &request.options.rate_limit {
            if limit.max_requests == 0 || limit.window.is_zero() {
                return Err(DispatchError::validation(
                    "rate limit needs a positive max_requests and window",
                ));
            }
        }

        let url = self.resolve_url(&request.path)?;

        if request.header_value("content-type").is_none() {
            request.set_header("content-type", JSON_CONTENT_TYPE);
        }
        for (name, value) in &self.config.default_headers {
            if request.header_value(name).is_none() {
                request.set_header(name, value.clone());
            }
        }

        validate_headers(&request.headers)?;
        encode_body(request.body.as_ref(), self.config.max_body_bytes)?;

        Ok(Prepared { request, url })
    }

    fn resolve_url(&self, path: &str) -> DispatchResult<Url> {
        let path = path.trim();
        let joined = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };
        Url::parse(&joined)
            .map_err(|e| DispatchError::validation(format!("invalid request URL {joined}: {e}")))
    }

    /// Headers and body are checked again since interceptors may change them
    fn transport_request(&self, request: &ApiRequest, url: &Url) -> DispatchResult<TransportRequest> {
        validate_headers(&request.headers)?;
        let mut transport_request = TransportRequest::new(request.method, url.clone());
        transport_request.headers = request.headers.clone();
        transport_request.body = encode_body(request.body.as_ref(), self.config.max_body_bytes)?;
        Ok(transport_request)
    }

    async fn acquire_rate_slot(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> DispatchResult<Option<Turn>> {
        let limit = options.rate_limit.unwrap_or_else(|| self.config.rate_limit.limit());
        let reject = self.config.rate_limit.overflow == OverflowPolicy::Reject;

        match self.queue.admit(endpoint, &quota(&limit), reject) {
            RateAdmission::Immediate => Ok(None),
            RateAdmission::Queued(turn) => match turn.await {
                Ok(turn) => Ok(Some(turn)),
                Err(_) => Err(DispatchError::new(
                    courier_domain::ErrorCode::RateLimitError,
                    format!("rate limit queue closed for {endpoint}"),
                )),
            },
            RateAdmission::Exceeded { reset_in } => {
                Err(DispatchError::rate_limited(endpoint, millis(reset_in)))
            }
        }
    }

    /// One network attempt, classified
    async fn attempt(
        &self,
        request: TransportRequest,
        deadline: Duration,
    ) -> DispatchResult<(TransportResponse, Value)> {
        let response = self.call_transport(request, deadline).await?;
        if !response.is_success() {
            return Err(DispatchError::from_response(
                response.status,
                &response.headers,
                &response.body,
            ));
        }
        let data = parse_body(&response.body).map_err(|e| e.with_status(response.status))?;
        Ok((response, data))
    }

    /// Transport call under `deadline` (zero disables it)
    ///
    /// On expiry the in-flight future is dropped, which aborts the request.
    async fn call_transport(
        &self,
        request: TransportRequest,
        deadline: Duration,
    ) -> DispatchResult<TransportResponse> {
        let call = self.transport.execute(request);
        let result = if deadline.is_zero() {
            call.await
        } else {
            tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| DispatchError::timeout(millis(deadline)))?
        };
        result.map_err(DispatchError::from)
    }

    /* ---------------------------------------------------------------------- */
    /* Health */
    /* ---------------------------------------------------------------------- */

    /// Probe `GET /health`, bypassing the cache, rate limiter and breakers
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        let result = self.probe_health().await;
        let latency_ms = millis(started.elapsed());

        let status = match result {
            Ok(status) => HealthStatus {
                reachable: (200..300).contains(&status),
                status: Some(status),
                latency_ms,
                error: None,
            },
            Err(error) => HealthStatus {
                reachable: false,
                status: error.status_code,
                latency_ms,
                error: Some(error.to_string()),
            },
        };
        debug!(reachable = status.reachable, status = ?status.status, latency_ms, "health check");
        status
    }

    async fn probe_health(&self) -> DispatchResult<u16> {
        let Prepared { request, url } = self.prepare(ApiRequest::get(HEALTH_CHECK_PATH))?;
        let request = self.interceptors.apply_request(request).await?;
        let transport_request = self.transport_request(&request, &url)?;
        let deadline = self.config.health_timeout.unwrap_or(self.config.default_timeout);
        let response = self.call_transport(transport_request, deadline).await?;
        Ok(response.status)
    }

    /* ---------------------------------------------------------------------- */
    /* Observability */
    /* ---------------------------------------------------------------------- */

    pub fn circuit_state(&self, endpoint: &str) -> CircuitState {
        self.circuits.state(endpoint)
    }

    pub fn circuit_snapshot(&self, endpoint: &str) -> Option<CircuitSnapshot> {
        self.circuits.snapshot(endpoint)
    }

    pub fn circuit_snapshots(&self) -> Vec<CircuitSnapshot> {
        self.circuits.snapshots()
    }

    /// Close an endpoint's circuit and forget its failures
    pub fn reset_circuit(&self, endpoint: &str) {
        self.circuits.reset(endpoint);
    }

    /// Window usage for an endpoint under the configured default limit
    pub fn rate_limit_info(&self, endpoint: &str) -> RateLimitInfo {
        self.limiter.info(endpoint, &quota(&self.config.rate_limit.limit()))
    }

    /// Requests for `endpoint` waiting in (or running from) the overflow queue
    pub fn queued_requests(&self, endpoint: &str) -> usize {
        self.queue.pending(endpoint)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The `limit` most recent request records, oldest first
    pub fn recent_metrics(&self, limit: usize) -> Vec<RequestRecord> {
        self.metrics.recent(limit)
    }

    pub fn metrics_summary(&self) -> MetricsSummary {
        self.metrics.summary()
    }
}

/// Settles a circuit admission exactly once
///
/// A probe that is dropped unsettled (validation failure, interceptor error,
/// cancelled future) is released so the next call can probe again.
struct CircuitGuard<'a> {
    circuits: &'a CircuitBreakerRegistry,
    endpoint: &'a str,
    admission: Admission,
    settled: bool,
}

impl<'a> CircuitGuard<'a> {
    fn new(circuits: &'a CircuitBreakerRegistry, endpoint: &'a str, admission: Admission) -> Self {
        Self { circuits, endpoint, admission, settled: false }
    }

    fn succeeded(mut self) {
        self.circuits.record_success(self.endpoint);
        self.settled = true;
    }

    fn failed(mut self) {
        self.circuits.record_failure(self.endpoint);
        self.settled = true;
    }

    /// The remote answered, but with an error that does not count against it
    fn reachable(mut self) {
        if self.admission == Admission::Probe {
            self.circuits.record_success(self.endpoint);
        }
        self.settled = true;
    }
}

impl Drop for CircuitGuard<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Probe {
            self.circuits.release_probe(self.endpoint);
        }
    }
}

pub(crate) fn quota(limit: &RateLimit) -> Quota {
    Quota::new(limit.max_requests, limit.window)
}

pub(crate) fn window_strategy(strategy: WindowStrategy) -> CommonWindowStrategy {
    match strategy {
        WindowStrategy::FixedWindow => CommonWindowStrategy::FixedWindow,
        WindowStrategy::SlidingLog => CommonWindowStrategy::SlidingLog,
    }
}

fn decode<T: DeserializeOwned>(response: ApiResponse, unwrap_envelope: bool) -> DispatchResult<T> {
    let status = response.status;
    let data = if unwrap_envelope { response.unwrapped_data().clone() } else { response.data };
    serde_json::from_value(data).map_err(|e| {
        DispatchError::unknown_response(format!("failed to decode response body: {e}"))
            .with_status(status)
    })
}

/// Empty bodies decode as `null`
fn parse_body(body: &[u8]) -> DispatchResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| DispatchError::unknown_response(format!("response body is not valid JSON: {e}")))
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> DispatchResult<Value> {
    serde_json::to_value(body)
        .map_err(|e| DispatchError::validation(format!("request body cannot be serialized: {e}")))
}

fn encode_body(body: Option<&Value>, max_bytes: usize) -> DispatchResult<Option<Vec<u8>>> {
    let Some(body) = body else {
        return Ok(None);
    };
    let bytes = serde_json::to_vec(body)
        .map_err(|e| DispatchError::validation(format!("request body cannot be serialized: {e}")))?;
    if bytes.len() > max_bytes {
        return Err(DispatchError::validation(format!(
            "request body of {} bytes exceeds the {max_bytes} byte limit",
            bytes.len()
        )));
    }
    Ok(Some(bytes))
}

fn validate_headers(headers: &BTreeMap<String, String>) -> DispatchResult<()> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| DispatchError::validation(format!("invalid header name: {name}")))?;
        HeaderValue::from_str(value)
            .map_err(|_| DispatchError::validation(format!("invalid value for header {name}")))?;
    }
    Ok(())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use courier_domain::ErrorCode;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::http::TransportError;

    /// Answers every call with the same response and remembers the requests
    #[derive(Default)]
    struct EchoTransport {
        seen: Mutex<Vec<TransportRequest>>,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn execute(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.lock().push(request);
            Ok(TransportResponse::new(200, r#"{"data":{"id":7},"message":"ok"}"#))
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    fn build(config: DispatcherConfig) -> (Dispatcher, Arc<EchoTransport>) {
        let transport = Arc::new(EchoTransport::default());
        let dispatcher = Dispatcher::builder()
            .config(config)
            .transport(transport.clone())
            .build()
            .expect("dispatcher");
        (dispatcher, transport)
    }

    #[tokio::test]
    async fn joins_paths_onto_base_url() {
        let (dispatcher, transport) = build(DispatcherConfig::new("https://api.example.com/v1/"));

        let _: Item = dispatcher.get("/items/7", RequestOptions::new()).await.unwrap();
        let _: Item = dispatcher.get("items?page=2", RequestOptions::new()).await.unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen[0].url.as_str(), "https://api.example.com/v1/items/7");
        assert_eq!(seen[1].url.as_str(), "https://api.example.com/v1/items?page=2");
        assert_eq!(seen[0].headers.get("content-type").map(String::as_str), Some(JSON_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn default_headers_do_not_override_call_headers() {
        let mut config = DispatcherConfig::new("https://api.example.com");
        config.default_headers.insert("x-client".to_string(), "courier".to_string());
        config.default_headers.insert("accept-language".to_string(), "en".to_string());
        let (dispatcher, transport) = build(config);

        let request = ApiRequest::get("/items").header("Accept-Language", "de");
        let _: Item = dispatcher.send(request).await.unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen[0].headers.get("accept-language").map(String::as_str), Some("de"));
        assert_eq!(seen[0].headers.get("x-client").map(String::as_str), Some("courier"));
    }

    #[tokio::test]
    async fn validation_failures_never_reach_the_transport() {
        let mut config = DispatcherConfig::new("https://api.example.com");
        config.max_body_bytes = 16;
        let (dispatcher, transport) = build(config);

        let cases = vec![
            ApiRequest::get("  "),
            ApiRequest::get("/items").header("bad header", "x"),
            ApiRequest::get("/items").header("x-ok", "line\nbreak"),
            ApiRequest::post("/items").body(json!({ "payload": "far more than sixteen bytes" })),
            ApiRequest::get("/items")
                .options(RequestOptions::new().rate_limit(0, Duration::from_secs(1))),
            ApiRequest::get("/items").options(RequestOptions::new().rate_limit(5, Duration::ZERO)),
        ];

        for request in cases {
            let error = dispatcher.send_raw(request).await.unwrap_err();
            assert!(error.is(ErrorCode::ValidationError), "{error}");
        }

        assert!(transport.seen.lock().is_empty());
        assert!(dispatcher.circuit_snapshots().is_empty());
        assert_eq!(dispatcher.metrics_summary().failures, 6);
    }

    #[tokio::test]
    async fn envelope_unwrapping_follows_config() {
        let (dispatcher, _) = build(DispatcherConfig::new("https://api.example.com"));
        let item: Item = dispatcher.get("/items/7", RequestOptions::new()).await.unwrap();
        assert_eq!(item, Item { id: 7 });

        let mut config = DispatcherConfig::new("https://api.example.com");
        config.unwrap_envelope = false;
        let (dispatcher, _) = build(config);
        let raw: Value = dispatcher.get("/items/7", RequestOptions::new()).await.unwrap();
        assert_eq!(raw, json!({ "data": { "id": 7 }, "message": "ok" }));
    }

    #[tokio::test]
    async fn decode_failure_is_unknown_response() {
        let (dispatcher, _) = build(DispatcherConfig::new("https://api.example.com"));
        let error = dispatcher.get::<Vec<String>>("/items/7", RequestOptions::new()).await.unwrap_err();

        assert!(error.is(ErrorCode::UnknownResponseError));
        assert_eq!(error.status_code, Some(200));

        let records = dispatcher.recent_metrics(1);
        assert_eq!(records[0].status, Some(200));
        assert_eq!(records[0].error, Some(ErrorCode::UnknownResponseError));
        assert_eq!(dispatcher.metrics_summary().failures, 1);
    }

    #[test]
    fn parses_empty_and_invalid_bodies() {
        assert_eq!(parse_body(b"").unwrap(), Value::Null);
        assert_eq!(parse_body(b" \n").unwrap(), Value::Null);
        assert_eq!(parse_body(b"[1]").unwrap(), json!([1]));
        assert!(parse_body(b"<html>").unwrap_err().is(ErrorCode::UnknownResponseError));
    }

    #[test]
    fn maps_window_strategies() {
        assert_eq!(window_strategy(WindowStrategy::FixedWindow), CommonWindowStrategy::FixedWindow);
        assert_eq!(window_strategy(WindowStrategy::SlidingLog), CommonWindowStrategy::SlidingLog);
        assert_eq!(
            quota(&RateLimit::new(3, Duration::from_secs(2))),
            Quota::new(3, Duration::from_secs(2))
        );
    }
}
