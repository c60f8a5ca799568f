//! Request and response interceptors
//!
//! Cross-cutting concerns (auth tokens, CSRF tokens, timing) attach to every
//! call through two ordered chains. Each interceptor receives the full value
//! and returns the value the next one sees; registration order is
//! application order. An interceptor error aborts the call with that error.

pub mod auth;
pub mod csrf;
pub mod timing;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use courier_domain::{ApiRequest, ApiResponse, DispatchResult};
use tracing::trace;

pub use auth::{AccessTokenProvider, AuthInterceptor, StaticTokenProvider};
pub use csrf::{CookieStore, CsrfInterceptor, MemoryCookieStore};
pub use timing::TimingInterceptor;

/// Transform applied to every outgoing request before transmission
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn on_request(&self, request: ApiRequest) -> DispatchResult<ApiRequest>;
}

/// Transform applied to every successful response before decoding
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    fn name(&self) -> &str;

    async fn on_response(&self, response: ApiResponse) -> DispatchResult<ApiResponse>;
}

/// The two interceptor chains owned by a dispatcher
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
}

impl fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("request", &self.request.iter().map(|i| i.name()).collect::<Vec<_>>())
            .field("response", &self.response.iter().map(|i| i.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.request.push(interceptor);
    }

    pub fn add_response(&mut self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.response.push(interceptor);
    }

    /// Register the timing interceptor on both chains
    pub fn add_timing(&mut self) {
        let timing = Arc::new(TimingInterceptor);
        self.request.push(timing.clone());
        self.response.push(timing);
    }

    pub fn request_len(&self) -> usize {
        self.request.len()
    }

    pub fn response_len(&self) -> usize {
        self.response.len()
    }

    /// Run the request chain in registration order
    pub async fn apply_request(&self, mut request: ApiRequest) -> DispatchResult<ApiRequest> {
        for interceptor in &self.request {
            trace!(interceptor = interceptor.name(), "applying request interceptor");
            request = interceptor.on_request(request).await?;
        }
        Ok(request)
    }

    /// Run the response chain in registration order
    pub async fn apply_response(&self, mut response: ApiResponse) -> DispatchResult<ApiResponse> {
        for interceptor in &self.response {
            trace!(interceptor = interceptor.name(), "applying response interceptor");
            response = interceptor.on_response(response).await?;
        }
        Ok(response)
    }
}
