//! Request timing metadata
//!
//! Stamps `start_time` on the way out and turns it into a `duration` on the
//! way back, for monitoring sinks that read response metadata.

use async_trait::async_trait;
use chrono::Utc;
use courier_domain::{ApiRequest, ApiResponse, DispatchResult};

use super::{RequestInterceptor, ResponseInterceptor};

#[derive(Debug, Clone, Copy, Default)]
pub struct TimingInterceptor;

#[async_trait]
impl RequestInterceptor for TimingInterceptor {
    fn name(&self) -> &str {
        "timing"
    }

    async fn on_request(&self, mut request: ApiRequest) -> DispatchResult<ApiRequest> {
        request.metadata.start_time = Some(Utc::now());
        Ok(request)
    }
}

#[async_trait]
impl ResponseInterceptor for TimingInterceptor {
    fn name(&self) -> &str {
        "timing"
    }

    async fn on_response(&self, mut response: ApiResponse) -> DispatchResult<ApiResponse> {
        if let Some(start) = response.metadata.request.start_time {
            // Negative spans (clock adjustments) are reported as zero
            let elapsed = (Utc::now() - start).to_std().unwrap_or_default();
            response.metadata.duration = Some(elapsed);
        }
        Ok(response)
    }
}
