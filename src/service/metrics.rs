//! Lightweight counters tracking service calls, failures, and latency for
//! every connection a factory hands out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct ConnectionMetrics {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_rejections: AtomicU64,
    total_timeouts: AtomicU64,
    total_latency_ns: AtomicU64,
}

impl ConnectionMetrics {
    pub(crate) fn record_success(&self, latency: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.add_latency(latency);
    }

    pub(crate) fn record_failure(&self, latency: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        self.add_latency(latency);
    }

    /// The service answered, but rejected the request.
    pub(crate) fn record_rejection(&self, latency: Duration) {
        self.record_failure(latency);
        self.total_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self, latency: Duration) {
        self.record_failure(latency);
        self.total_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    fn add_latency(&self, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ConnectionMetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_errors = self.total_errors.load(Ordering::Relaxed);
        let total_latency_ns = self.total_latency_ns.load(Ordering::Relaxed);

        let average_latency_ms = if total_requests == 0 {
            0.0
        } else {
            (total_latency_ns as f64 / total_requests as f64) / 1_000_000.0
        };

        let error_rate = if total_requests == 0 {
            0.0
        } else {
            total_errors as f64 / total_requests as f64
        };

        ConnectionMetricsSnapshot {
            total_requests,
            total_errors,
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
            average_latency_ms,
            error_rate,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ConnectionMetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_rejections: u64,
    pub total_timeouts: u64,
    pub average_latency_ms: f64,
    pub error_rate: f64,
}
