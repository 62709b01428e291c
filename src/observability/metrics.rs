use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::Error;

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Total store operations processed
    pub operations_total: AtomicU64,

    /// Operations by outcome
    pub operations_succeeded: AtomicU64,
    pub operations_rejected: AtomicU64,
    pub operations_failed: AtomicU64,

    /// Operation latency buckets (microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_5_10ms: AtomicU64,
    pub latency_10_50ms: AtomicU64,
    pub latency_50_100ms: AtomicU64,
    pub latency_over_100ms: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record an operation outcome.
    ///
    /// Client errors count as rejected, datastore failures as failed.
    pub fn record_operation(&self, error: Option<&Error>) {
        self.operations_total.fetch_add(1, Ordering::Relaxed);

        match error {
            None => {
                self.operations_succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Some(e) if e.is_client_error() => {
                self.operations_rejected.fetch_add(1, Ordering::Relaxed);
            }
            Some(_) => {
                self.operations_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record operation latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 1000 {
            self.latency_under_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 5000 {
            self.latency_1_5ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_5_10ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 50000 {
            self.latency_10_50ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 100000 {
            self.latency_50_100ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_100ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP tagstore_operations_total Total number of store operations
# TYPE tagstore_operations_total counter
tagstore_operations_total {}

# HELP tagstore_operations Store operations by outcome
# TYPE tagstore_operations counter
tagstore_operations{{outcome="ok"}} {}
tagstore_operations{{outcome="rejected"}} {}
tagstore_operations{{outcome="failed"}} {}

# HELP tagstore_operation_latency_bucket Operation latency histogram
# TYPE tagstore_operation_latency_bucket counter
tagstore_operation_latency_bucket{{le="0.001"}} {}
tagstore_operation_latency_bucket{{le="0.005"}} {}
tagstore_operation_latency_bucket{{le="0.01"}} {}
tagstore_operation_latency_bucket{{le="0.05"}} {}
tagstore_operation_latency_bucket{{le="0.1"}} {}
tagstore_operation_latency_bucket{{le="+Inf"}} {}
"#,
            self.operations_total.load(Ordering::Relaxed),
            self.operations_succeeded.load(Ordering::Relaxed),
            self.operations_rejected.load(Ordering::Relaxed),
            self.operations_failed.load(Ordering::Relaxed),
            self.latency_under_1ms.load(Ordering::Relaxed),
            self.latency_1_5ms.load(Ordering::Relaxed),
            self.latency_5_10ms.load(Ordering::Relaxed),
            self.latency_10_50ms.load(Ordering::Relaxed),
            self.latency_50_100ms.load(Ordering::Relaxed),
            self.latency_over_100ms.load(Ordering::Relaxed),
        )
    }
}
