//! Bearer token injection
//!
//! The session collaborator is reached through [`AccessTokenProvider`]; the
//! interceptor only decides what to do with the token it returns.

use std::sync::Arc;

use async_trait::async_trait;
use courier_domain::constants::AUTHORIZATION_HEADER;
use courier_domain::{ApiRequest, DispatchResult};
use parking_lot::RwLock;
use tracing::trace;

use super::RequestInterceptor;

/// Trait for providing access tokens
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Current bearer token, or `None` when there is no session
    ///
    /// Implementations that refresh tokens should do so here.
    async fn access_token(&self) -> DispatchResult<Option<String>>;
}

/// In-memory token holder for tests and simple embedding
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    token: RwLock<Option<String>>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: RwLock::new(Some(token.into())) }
    }

    /// A provider that starts without a session
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> DispatchResult<Option<String>> {
        Ok(self.token.read().clone())
    }
}

/// Sets `Authorization: Bearer <token>` when a token is available
///
/// A header set explicitly on the call is left untouched.
pub struct AuthInterceptor {
    provider: Arc<dyn AccessTokenProvider>,
}

impl AuthInterceptor {
    pub fn new(provider: Arc<dyn AccessTokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RequestInterceptor for AuthInterceptor {
    fn name(&self) -> &str {
        "auth"
    }

    async fn on_request(&self, mut request: ApiRequest) -> DispatchResult<ApiRequest> {
        if request.header_value(AUTHORIZATION_HEADER).is_some() {
            return Ok(request);
        }

        match self.provider.access_token().await? {
            Some(token) if !token.is_empty() => {
                request.set_header(AUTHORIZATION_HEADER, format!("Bearer {token}"));
            }
            _ => trace!(path = %request.path, "no access token, sending anonymously"),
        }
        Ok(request)
    }
}
