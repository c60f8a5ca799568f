//! HTTP transport
//!
//! [`Transport`] is the seam the dispatcher calls for each network attempt;
//! [`ReqwestTransport`] is the production implementation.

pub mod client;
pub mod transport;

pub use client::{ReqwestTransport, ReqwestTransportBuilder};
pub use transport::{
    Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
};
