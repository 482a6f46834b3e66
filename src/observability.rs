//! Observability stubs (metrics, tracing)

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    requests_dispatched: AtomicU64,
    batches_dispatched: AtomicU64,
    history_walks: AtomicU64,
    engine_errors: AtomicU64,
    sessions_created: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_dispatched(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn history_walk(&self) {
        self.history_walks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn engine_error(&self) {
        self.engine_errors.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "engine_errors", "Metric incremented");
    }

    pub fn session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            history_walks: self.history_walks.load(Ordering::Relaxed),
            engine_errors: self.engine_errors.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests_dispatched: u64,
    pub batches_dispatched: u64,
    pub history_walks: u64,
    pub engine_errors: u64,
    pub sessions_created: u64,
}
