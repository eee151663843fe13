use async_trait::async_trait;
use engine_config::settings::RunSettings;
use engine_core::{
    connectors::{
        memory::MemoryTable,
        sink::{SinkWriter, WriteAck},
        source::{PageFetcher, PagedSource},
    },
    error::{SourceError, WriteError},
    pool::PoolConfig,
};
use engine_processing::transform::Transformer;
use engine_runtime::engine::Engine;
use model::{
    pagination::page::{Page, PageRequest},
    records::record::Record,
};
use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// `n` students with ids `1..=n`.
pub fn students(n: i64) -> Vec<Record> {
    (1..=n)
        .map(|i| Record::new(i, format!("R{i}"), format!("Student{i}")))
        .collect()
}

pub fn student_table(n: i64) -> Arc<MemoryTable> {
    Arc::new(MemoryTable::new(students(n)))
}

/// Small pool so tests do not start hundreds of threads.
pub fn test_settings(chunk_size: usize, page_size: usize) -> RunSettings {
    RunSettings::default()
        .with_chunk_size(chunk_size)
        .with_page_size(page_size)
        .with_pool(
            PoolConfig::default()
                .with_sizes(4, 4)
                .with_queue_capacity(8)
                .with_thread_name_prefix("engine-test-"),
        )
}

/// Builds an engine over `fetcher` that writes into `sink`.
pub fn engine_with_sink<W: SinkWriter>(
    fetcher: Arc<dyn PageFetcher>,
    transformer: Arc<dyn Transformer>,
    sink: W,
    settings: RunSettings,
) -> Engine<W> {
    let source = PagedSource::new(fetcher, settings.page_size, settings.sort_key);
    Engine::new(source, transformer, sink, settings)
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Keeps every chunk it is handed, one entry per `write` call.
#[derive(Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<Vec<Record>>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Vec<Record>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn written_ids(&self) -> Vec<i64> {
        self.calls().iter().flatten().map(|r| r.id).collect()
    }
}

#[async_trait]
impl SinkWriter for RecordingSink {
    async fn write(&mut self, records: &[Record]) -> Result<WriteAck, WriteError> {
        self.calls.lock().unwrap().push(records.to_vec());
        Ok(WriteAck {
            lines: records.len(),
            bytes: 0,
        })
    }
}

/// Records successful writes and fails the write with the given zero-based index.
pub struct FailingSink {
    pub inner: RecordingSink,
    fail_on_call: usize,
    attempts: usize,
}

impl FailingSink {
    pub fn new(inner: RecordingSink, fail_on_call: usize) -> Self {
        Self {
            inner,
            fail_on_call,
            attempts: 0,
        }
    }
}

#[async_trait]
impl SinkWriter for FailingSink {
    async fn write(&mut self, records: &[Record]) -> Result<WriteAck, WriteError> {
        let attempt = self.attempts;
        self.attempts += 1;
        if attempt == self.fail_on_call {
            return Err(WriteError::Sink("disk full".into()));
        }
        self.inner.write(records).await
    }
}

/// Serves pages from a table until `healthy_pages` have been fetched, then
/// reports the store as unreachable.
pub struct FailingFetcher {
    table: MemoryTable,
    healthy_pages: usize,
    fetched: AtomicUsize,
}

impl FailingFetcher {
    pub fn new(rows: Vec<Record>, healthy_pages: usize) -> Self {
        Self {
            table: MemoryTable::new(rows),
            healthy_pages,
            fetched: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageFetcher for FailingFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, SourceError> {
        if self.fetched.fetch_add(1, Ordering::SeqCst) >= self.healthy_pages {
            return Err(SourceError::Unavailable("connection reset".into()));
        }
        self.table.fetch_page(request).await
    }
}
