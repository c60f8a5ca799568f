//! Observability infrastructure for metrics and logging
//!
//! - [`metrics`]: bounded buffer of per-request records with an optional sink
//! - [`logging`]: `tracing-subscriber` initialisation
//!
//! ## Error Handling
//!
//! Recording never fails. Aggregates over an empty buffer return
//! [`MetricsError::EmptyData`]:
//!
//! ```rust
//! use courier_infra::observability::{MetricsBuffer, MetricsError};
//!
//! let metrics = MetricsBuffer::new(100);
//! assert!(matches!(metrics.percentile_ms(0.95), Err(MetricsError::EmptyData { .. })));
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
pub use metrics::{MetricsBuffer, MetricsSink, MetricsSummary, RequestRecord};

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Empty data set - cannot calculate aggregate metric
    #[error("Empty data: cannot calculate {metric}")]
    EmptyData {
        /// Metric name that failed (e.g., "percentile", "average")
        metric: &'static str,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;
