use crate::summary::{RunStatus, RunSummary};
use engine_config::settings::SettingsError;
use engine_core::{
    error::{PoolError, SourceError, WriteError},
    metrics::MetricsSnapshot,
};
use engine_processing::error::{ChunkError, RecordFailure};
use model::core::identifiers::{ChunkIndex, RunId};
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

/// Top-level errors for a batch run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Settings failed validation.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// The transform worker pool could not be started.
    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Source error in chunk {chunk}: {source}")]
    Source {
        chunk: ChunkIndex,
        #[source]
        source: SourceError,
    },

    #[error("Chunk {chunk} rejected, failed records: {}", format_failures(.failures))]
    ChunkRejected {
        chunk: ChunkIndex,
        failures: Vec<RecordFailure>,
    },

    #[error("Write error in chunk {chunk}: {source}")]
    Write {
        chunk: ChunkIndex,
        #[source]
        source: WriteError,
    },

    /// The output file could not be opened or created.
    #[error("Cannot open output {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: WriteError,
    },

    /// Every run id has been issued; launching again would reuse one.
    #[error("No run id left after {last}")]
    RunIdsExhausted { last: RunId },

    /// Cancellation was observed at a chunk boundary.
    #[error("Run cancelled after {after_chunks} committed chunk(s)")]
    Cancelled { after_chunks: usize },

    /// An error occurred while joining a task.
    /// This usually indicates that the task was cancelled or panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<ChunkError> for EngineError {
    fn from(err: ChunkError) -> Self {
        match err {
            ChunkError::Source { chunk, source } => EngineError::Source { chunk, source },
            ChunkError::Transform { chunk, failures } => {
                EngineError::ChunkRejected { chunk, failures }
            }
            ChunkError::Write { chunk, source } => EngineError::Write { chunk, source },
        }
    }
}

impl EngineError {
    /// Chunk the run failed in, when the failure belongs to one.
    pub fn chunk(&self) -> Option<ChunkIndex> {
        match self {
            EngineError::Source { chunk, .. }
            | EngineError::ChunkRejected { chunk, .. }
            | EngineError::Write { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }
}

fn format_failures(failures: &[RecordFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.id, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A run that ended `Failed`, with everything it achieved before the failure.
#[derive(Debug, Error)]
#[error("Run {} failed: {error}", .summary.run_id)]
pub struct RunFailure {
    pub summary: RunSummary,
    #[source]
    pub error: EngineError,
}

impl RunFailure {
    /// A failure raised before the engine started; nothing was read or written.
    pub fn not_started(run_id: RunId, error: EngineError) -> Self {
        Self {
            summary: RunSummary::new(
                run_id,
                RunStatus::Failed,
                MetricsSnapshot::default(),
                chrono::Utc::now(),
                Duration::ZERO,
            ),
            error,
        }
    }
}
