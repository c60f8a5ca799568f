//! CSRF token injection from the cookie collaborator

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use courier_domain::constants::{CSRF_COOKIE, CSRF_HEADER};
use courier_domain::{ApiRequest, DispatchResult};
use parking_lot::RwLock;

use super::RequestInterceptor;

/// Read access to named cookies
pub trait CookieStore: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Cookie store backed by a map
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: RwLock<HashMap<String, String>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.cookies.write().remove(name);
    }
}

impl CookieStore for MemoryCookieStore {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.read().get(name).cloned()
    }
}

/// Copies the CSRF cookie into the `X-CSRF-Token` header
pub struct CsrfInterceptor {
    store: Arc<dyn CookieStore>,
    cookie_name: String,
}

impl CsrfInterceptor {
    pub fn new(store: Arc<dyn CookieStore>) -> Self {
        Self::with_cookie_name(store, CSRF_COOKIE)
    }

    pub fn with_cookie_name(store: Arc<dyn CookieStore>, cookie_name: impl Into<String>) -> Self {
        Self { store, cookie_name: cookie_name.into() }
    }
}

#[async_trait]
impl RequestInterceptor for CsrfInterceptor {
    fn name(&self) -> &str {
        "csrf"
    }

    async fn on_request(&self, mut request: ApiRequest) -> DispatchResult<ApiRequest> {
        if let Some(token) = self.store.cookie(&self.cookie_name).filter(|token| !token.is_empty()) {
            request.set_header(CSRF_HEADER, token);
        }
        Ok(request)
    }
}
