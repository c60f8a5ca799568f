//! # Courier Infrastructure
//!
//! The dispatcher and everything that touches the outside world.
//!
//! This crate contains:
//! - The request dispatcher (breakers, rate windows, overflow queue, cache,
//!   retry, interceptors)
//! - The `reqwest` transport behind the [`Transport`] seam
//! - Auth, CSRF and timing interceptors
//! - Configuration loading from environment and files
//! - Request metrics and tracing setup
//!
//! ## Architecture
//! - Composes the generic primitives from `courier-common`
//! - Speaks the types defined in `courier-domain`
//! - Contains all "impure" code (network, environment, files)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod dispatcher;
mod errors;
pub mod http;
pub mod interceptors;
pub mod observability;

// Re-export commonly used items
pub use dispatcher::{Dispatcher, DispatcherBuilder, HealthStatus, MaintenanceReport};
pub use http::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};
pub use interceptors::{
    AccessTokenProvider, AuthInterceptor, CookieStore, CsrfInterceptor, InterceptorPipeline,
    MemoryCookieStore, RequestInterceptor, ResponseInterceptor, StaticTokenProvider,
    TimingInterceptor,
};
pub use observability::{init_tracing, MetricsBuffer, MetricsSink, MetricsSummary, RequestRecord};
