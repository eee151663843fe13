use crate::{
    pagination::{cursor::Cursor, sort::SortKey},
    records::record::Record,
};

/// A single keyset page query: up to `page_size` records strictly after `after`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub after: Cursor,
    pub sort_key: SortKey,
    pub page_size: usize,
}

/// Result of one page fetch, in ascending sort order.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Record>,
}

impl Page {
    pub fn new(records: Vec<Record>) -> Self {
        Page { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A page shorter than requested is the last one.
    pub fn is_last(&self, request: &PageRequest) -> bool {
        self.records.len() < request.page_size
    }
}
