//! Per-request records for monitoring
//!
//! Every dispatched call produces one [`RequestRecord`]. The
//! [`MetricsBuffer`] keeps the most recent ones in a ring buffer and forwards
//! each record to an optional [`MetricsSink`].
//!
//! ## Design
//! - **VecDeque ring buffer** for O(1) eviction of the oldest record
//! - **parking_lot Mutex** so no lock can be poisoned by a panicking reader
//! - Sinks are called inline and must return quickly

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_domain::{ErrorCode, HttpMethod};
use parking_lot::Mutex;
use serde::Serialize;

use crate::observability::{MetricsError, MetricsResult};

/// Outcome of one dispatched call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub endpoint: String,
    pub method: HttpMethod,
    pub duration_ms: u64,
    /// HTTP status when a response was received
    pub status: Option<u16>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<ErrorCode>,
    pub from_cache: bool,
    /// Network attempts made (zero for cache hits and short-circuits)
    pub attempts: u32,
}

impl RequestRecord {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Receiver notified for every record
///
/// Called on the dispatch path; implementations must not block.
pub trait MetricsSink: Send + Sync {
    fn record(&self, record: &RequestRecord);
}

/// Aggregate view over the buffered records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// Records currently buffered
    pub buffered: usize,
    /// Records ever seen, including evicted ones
    pub total_recorded: u64,
    pub failures: usize,
    pub cache_hits: usize,
    pub average_duration_ms: f64,
    pub p95_duration_ms: Option<u64>,
}

/// Bounded buffer of the most recent request records
pub struct MetricsBuffer {
    records: Mutex<VecDeque<RequestRecord>>,
    capacity: usize,
    total_recorded: AtomicU64,
    sink: Option<Arc<dyn MetricsSink>>,
}

impl fmt::Debug for MetricsBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl MetricsBuffer {
    /// Create a buffer holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            total_recorded: AtomicU64::new(0),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a record, evicting the oldest when full, and notify the sink
    pub fn record(&self, record: RequestRecord) {
        if let Some(sink) = &self.sink {
            sink.record(&record);
        }

        self.total_recorded.fetch_add(1, Ordering::Relaxed);
        let mut records = self.records.lock();
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
    }

    /// The `limit` most recent records, oldest first
    pub fn recent(&self, limit: usize) -> Vec<RequestRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(limit);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Duration percentile over the buffered records
    ///
    /// Returns `MetricsError::EmptyData` if nothing has been recorded.
    pub fn percentile_ms(&self, percentile: f64) -> MetricsResult<u64> {
        let records = self.records.lock();
        percentile_of(records.iter().map(|r| r.duration_ms), percentile)
    }

    pub fn summary(&self) -> MetricsSummary {
        let records = self.records.lock();
        let buffered = records.len();
        let failures = records.iter().filter(|r| r.is_failure()).count();
        let cache_hits = records.iter().filter(|r| r.from_cache).count();
        let total_ms: u64 = records.iter().map(|r| r.duration_ms).sum();
        let average_duration_ms =
            if buffered == 0 { 0.0 } else { total_ms as f64 / buffered as f64 };

        MetricsSummary {
            buffered,
            total_recorded: self.total_recorded.load(Ordering::Relaxed),
            failures,
            cache_hits,
            average_duration_ms,
            p95_duration_ms: percentile_of(records.iter().map(|r| r.duration_ms), 0.95).ok(),
        }
    }
}

fn percentile_of(durations: impl Iterator<Item = u64>, percentile: f64) -> MetricsResult<u64> {
    let mut sorted: Vec<u64> = durations.collect();
    if sorted.is_empty() {
        return Err(MetricsError::EmptyData { metric: "percentile" });
    }
    sorted.sort_unstable();
    let index = ((sorted.len() as f64 * percentile) as usize).min(sorted.len() - 1);
    Ok(sorted[index])
}
