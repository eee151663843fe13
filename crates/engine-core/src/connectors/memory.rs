use crate::{connectors::source::PageFetcher, error::SourceError};
use async_trait::async_trait;
use model::{
    pagination::page::{Page, PageRequest},
    records::record::Record,
};

/// An in-memory table answering keyset page queries the way an
/// `ORDER BY <key>, id ... LIMIT n` query would.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: Vec<Record>,
}

impl MemoryTable {
    pub fn new(rows: Vec<Record>) -> Self {
        MemoryTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl PageFetcher for MemoryTable {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, SourceError> {
        let mut matching: Vec<&Record> = self
            .rows
            .iter()
            .filter(|record| request.after.precedes(record, request.sort_key))
            .collect();
        matching.sort_by(|a, b| request.sort_key.compare(a, b));

        Ok(Page::new(
            matching
                .into_iter()
                .take(request.page_size)
                .cloned()
                .collect(),
        ))
    }
}
