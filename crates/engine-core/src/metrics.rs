use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    records_read: AtomicU64,
    records_written: AtomicU64,
    chunks_committed: AtomicU64,
    transform_failures: AtomicU64,
    caller_runs: AtomicU64,
    rejections: AtomicU64,
}

/// Run counters shared between the orchestration task and the worker pool.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_read: u64,
    pub records_written: u64,
    pub chunks_committed: u64,
    pub transform_failures: u64,
    pub caller_runs: u64,
    pub rejections: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_read(&self, count: u64) {
        self.inner.records_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_written(&self, count: u64) {
        self.inner
            .records_written
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_chunks(&self, count: u64) {
        self.inner
            .chunks_committed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_transform_failures(&self, count: u64) {
        self.inner
            .transform_failures
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_caller_runs(&self) {
        self.inner.caller_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejections(&self) {
        self.inner.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_read: self.inner.records_read.load(Ordering::Relaxed),
            records_written: self.inner.records_written.load(Ordering::Relaxed),
            chunks_committed: self.inner.chunks_committed.load(Ordering::Relaxed),
            transform_failures: self.inner.transform_failures.load(Ordering::Relaxed),
            caller_runs: self.inner.caller_runs.load(Ordering::Relaxed),
            rejections: self.inner.rejections.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
