use engine_core::{
    connectors::{format::DelimitedLineAggregator, sink::OpenMode},
    error::WriteError,
};
use model::records::record::RECORD_FIELDS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where and how committed chunks are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub path: PathBuf,
    pub delimiter: String,
    /// Record fields in output column order.
    pub fields: Vec<String>,
    pub mode: OpenMode,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/batch/data.csv"),
            delimiter: ",".to_string(),
            fields: RECORD_FIELDS.iter().map(|f| f.to_string()).collect(),
            mode: OpenMode::Overwrite,
        }
    }
}

impl OutputSettings {
    pub fn aggregator(&self) -> Result<DelimitedLineAggregator, WriteError> {
        DelimitedLineAggregator::new(&self.delimiter, self.fields.iter().cloned())
    }
}
