use engine_core::error::TransformError;
use model::records::record::Record;

pub mod builtin;
pub mod pipeline;

/// User business logic applied to one record at a time.
///
/// Implementations are invoked concurrently from pool workers and must not
/// share mutable state between calls. A failure affects only the record it
/// was returned for.
pub trait Transformer: Send + Sync {
    fn transform(&self, record: Record) -> Result<Record, TransformError>;
}

impl<F> Transformer for F
where
    F: Fn(Record) -> Result<Record, TransformError> + Send + Sync,
{
    fn transform(&self, record: Record) -> Result<Record, TransformError> {
        self(record)
    }
}
