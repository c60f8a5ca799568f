//! Request and response types shared by every dispatch layer component

pub mod request;
pub mod response;

pub use request::{ApiRequest, HttpMethod, RateLimit, RequestMetadata, RequestOptions};
pub use response::{ApiResponse, ResponseMetadata};
