use model::pagination::cursor::Cursor;
use thiserror::Error;

/// Failures of the paged backing store. Always fatal to a run.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    #[error("Page fetch failed at cursor {cursor:?}: {source}")]
    Fetch {
        cursor: Cursor,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Backing store returned record {id} which does not sort after cursor {cursor:?}")]
    OutOfOrder { cursor: Cursor, id: i64 },
}

/// Failure of a single record's transform. Captured into its handle, never
/// raised across the worker pool boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Transform of record {id} failed: {reason}")]
    Failed { id: i64, reason: String },

    #[error("Transform of record {id} panicked: {message}")]
    Panicked { id: i64, message: String },

    #[error("Record {id} was rejected by the saturated worker pool")]
    Rejected { id: i64 },

    #[error("Transform of record {id} was abandoned before completion")]
    Abandoned { id: i64 },
}

impl TransformError {
    pub fn failed(id: i64, reason: impl Into<String>) -> Self {
        TransformError::Failed {
            id,
            reason: reason.into(),
        }
    }

    pub fn record_id(&self) -> i64 {
        match self {
            TransformError::Failed { id, .. }
            | TransformError::Panicked { id, .. }
            | TransformError::Rejected { id }
            | TransformError::Abandoned { id } => *id,
        }
    }
}

/// Failures while serializing or persisting a chunk.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Field '{field}' of record {id} contains the delimiter {delimiter:?}")]
    DelimiterInField {
        id: i64,
        field: String,
        delimiter: String,
    },

    #[error("Field '{field}' of record {id} contains a line break")]
    LineBreakInField { id: i64, field: String },

    #[error("Unknown output field: {0}")]
    UnknownField(String),

    #[error("Delimiter must be a single ASCII character other than a line break, got {0:?}")]
    InvalidDelimiter(String),

    #[error("Failed to encode line: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sink error: {0}")]
    Sink(String),
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
