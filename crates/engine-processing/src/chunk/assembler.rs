use crate::{
    chunk::{Chunk, ChunkState},
    error::{ChunkError, RecordFailure},
    stage::AsyncTransformStage,
};
use engine_core::{
    connectors::{
        sink::{SinkWriter, WriteAck},
        source::PagedSource,
    },
    metrics::Metrics,
};
use model::core::identifiers::ChunkIndex;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// A chunk that reached durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    pub index: ChunkIndex,
    pub records: usize,
    pub ack: WriteAck,
    pub duration: Duration,
}

#[derive(Debug)]
pub enum ChunkOutcome {
    Committed(ChunkReport),
    /// The source ran dry before a single record of a new chunk was read.
    Exhausted,
}

/// Drives one chunk at a time through read, dispatch, join and commit.
///
/// Owns the source, the transform stage and the writer for the length of a
/// run. Reads and writes happen only on the task calling [`process_next`];
/// the join on outstanding handles is the only suspension point between them.
///
/// [`process_next`]: ChunkAssembler::process_next
pub struct ChunkAssembler<W: SinkWriter> {
    source: PagedSource,
    stage: AsyncTransformStage,
    writer: W,
    chunk_size: usize,
    next_index: ChunkIndex,
    source_done: bool,
    metrics: Metrics,
}

impl<W: SinkWriter> ChunkAssembler<W> {
    pub fn new(
        source: PagedSource,
        stage: AsyncTransformStage,
        writer: W,
        chunk_size: usize,
        metrics: Metrics,
    ) -> Self {
        Self {
            source,
            stage,
            writer,
            chunk_size: chunk_size.max(1),
            next_index: ChunkIndex::new(0),
            source_done: false,
            metrics,
        }
    }

    /// Index the next chunk will receive; equals the number of chunks committed so far.
    pub fn next_index(&self) -> ChunkIndex {
        self.next_index
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Runs a full chunk cycle. A failed chunk writes nothing.
    pub async fn process_next(&mut self) -> Result<ChunkOutcome, ChunkError> {
        let started = Instant::now();
        let mut chunk = Chunk::new(self.next_index, self.chunk_size);

        if let Err(e) = self.fill(&mut chunk).await {
            chunk.transition(ChunkState::Failed);
            error!(chunk = %chunk.index(), error = %e, "Chunk failed");
            return Err(e);
        }

        if chunk.is_empty() {
            debug!(chunk = %chunk.index(), "Source exhausted at chunk boundary");
            return Ok(ChunkOutcome::Exhausted);
        }

        let outcomes = chunk.await_completion().await;
        chunk.transition(ChunkState::Committing);

        let mut records = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (slot, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(record) => records.push(record),
                Err(error) => failures.push(RecordFailure {
                    slot,
                    id: error.record_id(),
                    error,
                }),
            }
        }

        if !failures.is_empty() {
            chunk.transition(ChunkState::Failed);
            self.metrics.increment_transform_failures(failures.len() as u64);
            let err = ChunkError::Transform {
                chunk: chunk.index(),
                failures,
            };
            error!(chunk = %chunk.index(), failed_ids = ?err.failed_ids(), "Chunk failed");
            return Err(err);
        }

        let ack = match self.writer.write(&records).await {
            Ok(ack) => ack,
            Err(source) => {
                chunk.transition(ChunkState::Failed);
                error!(chunk = %chunk.index(), error = %source, "Chunk failed");
                return Err(ChunkError::Write {
                    chunk: chunk.index(),
                    source,
                });
            }
        };

        chunk.transition(ChunkState::Committed);
        self.metrics.increment_written(records.len() as u64);
        self.metrics.increment_chunks(1);
        self.next_index = self.next_index.next();

        let report = ChunkReport {
            index: chunk.index(),
            records: records.len(),
            ack,
            duration: started.elapsed(),
        };
        info!(
            chunk = %report.index,
            records = report.records,
            bytes = report.ack.bytes,
            duration_ms = report.duration.as_millis(),
            "Chunk committed"
        );
        Ok(ChunkOutcome::Committed(report))
    }

    /// Gives back the stage so the caller can shut the pool down, and the writer.
    pub fn into_parts(self) -> (PagedSource, AsyncTransformStage, W) {
        (self.source, self.stage, self.writer)
    }

    async fn fill(&mut self, chunk: &mut Chunk) -> Result<(), ChunkError> {
        while !chunk.is_full() && !self.source_done {
            let record = self
                .source
                .next()
                .await
                .map_err(|source| ChunkError::Source {
                    chunk: chunk.index(),
                    source,
                })?;

            let Some(record) = record else {
                self.source_done = true;
                break;
            };

            self.metrics.increment_read(1);
            let slot = chunk.next_slot();
            chunk.push(self.stage.submit(slot, record));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::builtin::Identity;
    use async_trait::async_trait;
    use engine_core::{
        connectors::memory::MemoryTable,
        error::{TransformError, WriteError},
        pool::PoolConfig,
    };
    use model::{pagination::sort::SortKey, records::record::Record};
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct VecSink {
        writes: Vec<Vec<Record>>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl SinkWriter for VecSink {
        async fn write(&mut self, records: &[Record]) -> Result<WriteAck, WriteError> {
            if self.fail_on_call == Some(self.writes.len()) {
                return Err(WriteError::Sink("disk full".into()));
            }
            self.writes.push(records.to_vec());
            Ok(WriteAck {
                lines: records.len(),
                bytes: 0,
            })
        }
    }

    fn students(n: i64) -> Vec<Record> {
        (1..=n)
            .map(|i| Record::new(i, format!("R{i}"), format!("Student {i}")))
            .collect()
    }

    fn assembler<T>(rows: Vec<Record>, chunk_size: usize, transformer: T, sink: VecSink) -> ChunkAssembler<VecSink>
    where
        T: crate::transform::Transformer + 'static,
    {
        let metrics = Metrics::new();
        let source = PagedSource::new(Arc::new(MemoryTable::new(rows)), 4, SortKey::Id);
        let stage = AsyncTransformStage::new(
            PoolConfig::default()
                .with_sizes(2, 4)
                .with_queue_capacity(4)
                .with_thread_name_prefix("assembler-test-"),
            Arc::new(transformer),
            metrics.clone(),
        )
        .unwrap();
        ChunkAssembler::new(source, stage, sink, chunk_size, metrics)
    }

    async fn drain(assembler: &mut ChunkAssembler<VecSink>) -> Vec<ChunkReport> {
        let mut reports = Vec::new();
        while let ChunkOutcome::Committed(report) = assembler.process_next().await.unwrap() {
            reports.push(report);
        }
        reports
    }

    #[traced_test]
    #[tokio::test]
    async fn partial_last_chunk_is_committed() {
        let mut assembler = assembler(students(7), 3, Identity, VecSink::default());
        let reports = drain(&mut assembler).await;

        let sizes: Vec<usize> = reports.iter().map(|r| r.records).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(assembler.next_index(), ChunkIndex::new(3));

        let written: Vec<i64> = assembler.writer().writes.iter().flatten().map(|r| r.id).collect();
        assert_eq!(written, (1..=7).collect::<Vec<_>>());
        assert!(logs_contain("Chunk committed"));
    }

    #[tokio::test]
    async fn exact_multiple_produces_no_empty_chunk() {
        let mut assembler = assembler(students(6), 3, Identity, VecSink::default());
        let reports = drain(&mut assembler).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(assembler.writer().writes.len(), 2);
    }

    #[tokio::test]
    async fn failed_record_rejects_whole_chunk() {
        let transformer = |r: Record| -> Result<Record, TransformError> {
            if r.id == 5 {
                Err(TransformError::failed(r.id, "missing roll number"))
            } else {
                Ok(r)
            }
        };
        let mut assembler = assembler(students(9), 3, transformer, VecSink::default());

        assert!(matches!(
            assembler.process_next().await.unwrap(),
            ChunkOutcome::Committed(_)
        ));
        let err = assembler.process_next().await.unwrap_err();
        match &err {
            ChunkError::Transform { chunk, failures } => {
                assert_eq!(*chunk, ChunkIndex::new(1));
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].slot, 1);
                assert_eq!(failures[0].id, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(assembler.writer().writes.len(), 1);
    }

    #[tokio::test]
    async fn write_failure_fails_chunk() {
        let sink = VecSink {
            fail_on_call: Some(1),
            ..Default::default()
        };
        let mut assembler = assembler(students(6), 2, Identity, sink);

        assembler.process_next().await.unwrap();
        let err = assembler.process_next().await.unwrap_err();
        assert!(matches!(err, ChunkError::Write { chunk, .. } if chunk == ChunkIndex::new(1)));
        assert_eq!(assembler.next_index(), ChunkIndex::new(1));
    }

    #[tokio::test]
    async fn empty_source_is_exhausted_immediately() {
        let mut assembler = assembler(Vec::new(), 3, Identity, VecSink::default());
        assert!(matches!(
            assembler.process_next().await.unwrap(),
            ChunkOutcome::Exhausted
        ));
        assert!(assembler.writer().writes.is_empty());
    }
}
