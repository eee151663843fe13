use engine_core::error::{SourceError, TransformError, WriteError};
use model::core::identifiers::ChunkIndex;
use std::fmt;
use thiserror::Error;

/// A record whose transform failed, with its position in the chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub slot: usize,
    pub id: i64,
    pub error: TransformError,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} (record {}): {}", self.slot, self.id, self.error)
    }
}

/// Why a chunk ended in the `Failed` state.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Source failed while filling chunk {chunk}: {source}")]
    Source {
        chunk: ChunkIndex,
        #[source]
        source: SourceError,
    },

    #[error("Chunk {chunk} rejected: {} record(s) failed to transform, first: {}", .failures.len(), .failures.first().map(ToString::to_string).unwrap_or_default())]
    Transform {
        chunk: ChunkIndex,
        failures: Vec<RecordFailure>,
    },

    #[error("Failed to write chunk {chunk}: {source}")]
    Write {
        chunk: ChunkIndex,
        #[source]
        source: WriteError,
    },
}

impl ChunkError {
    pub fn chunk(&self) -> ChunkIndex {
        match self {
            ChunkError::Source { chunk, .. }
            | ChunkError::Transform { chunk, .. }
            | ChunkError::Write { chunk, .. } => *chunk,
        }
    }

    /// Ids of the records that failed to transform, in slot order.
    pub fn failed_ids(&self) -> Vec<i64> {
        match self {
            ChunkError::Transform { failures, .. } => failures.iter().map(|f| f.id).collect(),
            _ => Vec::new(),
        }
    }
}
