use crate::transform::Transformer;
use engine_core::error::TransformError;
use model::records::record::Record;
use std::sync::Arc;

pub trait TransformPipelineExt {
    fn add_if<T, F>(self, condition: bool, factory: F) -> Self
    where
        T: Transformer + 'static,
        F: FnOnce() -> T;
}

/// Applies a sequence of transformers in order, stopping at the first failure.
#[derive(Clone)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn Transformer>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn add_transform<T: Transformer + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transformer for TransformPipeline {
    fn transform(&self, record: Record) -> Result<Record, TransformError> {
        self.transforms
            .iter()
            .try_fold(record, |acc, transform| transform.transform(acc))
    }
}

impl TransformPipelineExt for TransformPipeline {
    fn add_if<T, F>(mut self, condition: bool, factory: F) -> Self
    where
        T: Transformer + 'static,
        F: FnOnce() -> T,
    {
        if condition {
            self = self.add_transform(factory());
        }
        self
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}
