use crate::error::SourceError;
use async_trait::async_trait;
use model::{
    pagination::{
        cursor::Cursor,
        page::{Page, PageRequest},
        sort::SortKey,
    },
    records::record::Record,
};
use std::{collections::VecDeque, sync::Arc};
use tracing::debug;

/// The backing store as seen by the pipeline: answers keyset page queries.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, SourceError>;
}

/// Yields records one at a time from a paged, ordered store.
///
/// Holds at most one page in memory. The cursor is the key of the last record
/// handed out and only ever moves forward.
pub struct PagedSource {
    fetcher: Arc<dyn PageFetcher>,
    sort_key: SortKey,
    page_size: usize,
    cursor: Cursor,
    buffer: VecDeque<Record>,
    exhausted: bool,
    pages_fetched: usize,
}

impl PagedSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, page_size: usize, sort_key: SortKey) -> Self {
        let page_size = page_size.max(1);
        Self {
            fetcher,
            sort_key,
            page_size,
            cursor: Cursor::None,
            buffer: VecDeque::with_capacity(page_size),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Next record in sort order, or `None` at end of stream.
    pub async fn next(&mut self) -> Result<Option<Record>, SourceError> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                self.cursor = Cursor::after(&record, self.sort_key);
                return Ok(Some(record));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
    }

    async fn fetch_next_page(&mut self) -> Result<(), SourceError> {
        let request = PageRequest {
            after: self.cursor.clone(),
            sort_key: self.sort_key,
            page_size: self.page_size,
        };
        let page = self.fetcher.fetch_page(&request).await?;
        self.check_order(&page)?;

        self.pages_fetched += 1;
        self.exhausted = page.is_last(&request);

        debug!(
            page = self.pages_fetched,
            rows = page.len(),
            after = ?request.after,
            last = self.exhausted,
            "Fetched page"
        );

        self.buffer.extend(page.records);
        Ok(())
    }

    /// Every record must sort strictly after the previous one, starting from
    /// the cursor. Anything else would duplicate or skip rows across pages.
    fn check_order(&self, page: &Page) -> Result<(), SourceError> {
        let mut last = self.cursor.clone();
        for record in &page.records {
            if !last.precedes(record, self.sort_key) {
                return Err(SourceError::OutOfOrder {
                    cursor: last,
                    id: record.id,
                });
            }
            last = Cursor::after(record, self.sort_key);
        }
        Ok(())
    }
}
