use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Running counters shared by every batch an executor dispatches.
#[derive(Default, Debug)]
pub struct Telemetry {
    connections_created: AtomicU64,
    connections_disposed: AtomicU64,
    connection_failures: AtomicU64,
    requests_succeeded: AtomicU64,
    domain_faults: AtomicU64,
    transient_faults: AtomicU64,
    batches_completed: AtomicU64,
}

impl Telemetry {
    pub fn record_connection_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_disposed(&self) {
        self.connections_disposed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_successes(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.requests_succeeded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_domain_fault(&self) {
        self.domain_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_fault(&self) {
        self.transient_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_completed(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_disposed: self.connections_disposed.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            domain_faults: self.domain_faults.load(Ordering::Relaxed),
            transient_faults: self.transient_faults.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
        }
    }

    /// Connections created but not yet handed back to their factory.
    pub fn open_connections(&self) -> u64 {
        let created = self.connections_created.load(Ordering::Relaxed);
        let disposed = self.connections_disposed.load(Ordering::Relaxed);
        created.saturating_sub(disposed)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub connections_created: u64,
    pub connections_disposed: u64,
    pub connection_failures: u64,
    pub requests_succeeded: u64,
    pub domain_faults: u64,
    pub transient_faults: u64,
    pub batches_completed: u64,
}

impl TelemetrySnapshot {
    pub fn faults(&self) -> u64 {
        self.domain_faults.saturating_add(self.transient_faults)
    }
}
