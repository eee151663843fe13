use crate::transform::Transformer;
use engine_core::error::TransformError;
use model::records::record::Record;

/// Passes records through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transformer for Identity {
    fn transform(&self, record: Record) -> Result<Record, TransformError> {
        Ok(record)
    }
}

/// Strips surrounding whitespace from the text fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimFields;

impl Transformer for TrimFields {
    fn transform(&self, mut record: Record) -> Result<Record, TransformError> {
        record.roll_number = record.roll_number.trim().to_string();
        record.name = record.name.trim().to_string();
        Ok(record)
    }
}

/// Fails records whose roll number is blank.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireRollNumber;

impl Transformer for RequireRollNumber {
    fn transform(&self, record: Record) -> Result<Record, TransformError> {
        if record.roll_number.trim().is_empty() {
            return Err(TransformError::failed(record.id, "roll number is blank"));
        }
        Ok(record)
    }
}
