use chrono::{DateTime, Utc};
use engine_core::metrics::MetricsSnapshot;
use model::core::identifiers::RunId;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// What a run did, reported whether it completed or failed.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    pub chunks_committed: u64,
    pub records_written: u64,
    pub metrics: MetricsSnapshot,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(
        run_id: RunId,
        status: RunStatus,
        metrics: MetricsSnapshot,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            run_id,
            status,
            chunks_committed: metrics.chunks_committed,
            records_written: metrics.records_written,
            metrics,
            started_at,
            elapsed,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
