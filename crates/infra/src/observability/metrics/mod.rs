//! Metrics collection modules
//!
//! Thread-safe request metrics for the dispatcher.

pub mod request;

// Re-export metric types for convenience
pub use request::{MetricsBuffer, MetricsSink, MetricsSummary, RequestRecord};
