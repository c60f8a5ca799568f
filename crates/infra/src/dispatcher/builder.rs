//! Fluent construction of a [`Dispatcher`]

use std::sync::Arc;

use courier_common::cache::{CacheConfig, ResponseCache};
use courier_common::resilience::{
    CircuitBreakerConfig, CircuitBreakerRegistry, RateLimiterRegistry, SharedClock, TokioClock,
};
use courier_domain::{ConfigError, DispatcherConfig};
use tracing::info;
use url::Url;

use super::queue::RateLimitQueue;
use super::{window_strategy, Dispatcher};
use crate::http::{ReqwestTransport, Transport};
use crate::interceptors::{
    AccessTokenProvider, AuthInterceptor, CookieStore, CsrfInterceptor, InterceptorPipeline,
    RequestInterceptor, ResponseInterceptor,
};
use crate::observability::{MetricsBuffer, MetricsSink};

/// Builder for [`Dispatcher`].
///
/// Interceptors run in the order they are added.
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    transport: Option<Arc<dyn Transport>>,
    interceptors: InterceptorPipeline,
    clock: Option<SharedClock>,
    metrics_sink: Option<Arc<dyn MetricsSink>>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            transport: None,
            interceptors: InterceptorPipeline::new(),
            clock: None,
            metrics_sink: None,
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Replace the default `reqwest` transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.add_request(interceptor);
        self
    }

    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.interceptors.add_response(interceptor);
        self
    }

    /// Inject `Authorization: Bearer` from the session collaborator
    pub fn with_auth(self, provider: Arc<dyn AccessTokenProvider>) -> Self {
        self.request_interceptor(Arc::new(AuthInterceptor::new(provider)))
    }

    /// Inject `X-CSRF-Token` from the cookie collaborator
    pub fn with_csrf(self, store: Arc<dyn CookieStore>) -> Self {
        self.request_interceptor(Arc::new(CsrfInterceptor::new(store)))
    }

    /// Stamp start times and compute response durations
    pub fn with_timing(mut self) -> Self {
        self.interceptors.add_timing();
        self
    }

    /// Clock for breakers, rate windows and the cache (defaults to tokio time)
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics_sink = Some(sink);
        self
    }

    /// Validate the configuration and assemble the dispatcher
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid or the default
    /// transport cannot be built.
    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        let Self { config, transport, interceptors, clock, metrics_sink } = self;
        config.validate()?;

        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| ConfigError::invalid("base_url", e.to_string()))?;

        let transport: Arc<dyn Transport> = match transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new().map_err(|e| ConfigError::invalid("transport", e.to_string()))?,
            ),
        };

        let clock = clock.unwrap_or_else(|| Arc::new(TokioClock));

        let circuit_config = CircuitBreakerConfig::builder()
            .failure_threshold(config.circuit.failure_threshold)
            .reset_timeout(config.circuit.reset_timeout)
            .reset_on_success(true)
            .build()
            .map_err(|e| ConfigError::invalid("circuit", e.message))?;
        let circuits = Arc::new(
            CircuitBreakerRegistry::with_clock(circuit_config, clock.clone())
                .map_err(|e| ConfigError::invalid("circuit", e.message))?,
        );

        let limiter = Arc::new(RateLimiterRegistry::with_clock(
            window_strategy(config.rate_limit.strategy),
            clock.clone(),
        ));
        let queue = RateLimitQueue::new(limiter.clone(), config.rate_limit.queue_delay);

        let cache_config =
            CacheConfig { default_ttl: config.cache.default_ttl, max_entries: config.cache.max_entries };
        cache_config.validate().map_err(|e| ConfigError::invalid("cache", e.message))?;
        let cache = Arc::new(ResponseCache::with_clock(cache_config, clock));

        let mut metrics = MetricsBuffer::new(config.metrics_capacity);
        if let Some(sink) = metrics_sink {
            metrics = metrics.with_sink(sink);
        }

        info!(
            base_url = %base_url,
            interceptors = interceptors.request_len() + interceptors.response_len(),
            "dispatcher ready"
        );

        Ok(Dispatcher {
            config,
            base_url,
            transport,
            interceptors,
            circuits,
            limiter,
            queue,
            cache,
            metrics: Arc::new(metrics),
        })
    }
}
