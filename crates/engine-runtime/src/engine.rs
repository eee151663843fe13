use crate::{
    error::{EngineError, RunFailure},
    summary::{RunStatus, RunSummary},
};
use chrono::Utc;
use engine_config::settings::{RunSettings, SettingsError};
use engine_core::{
    connectors::{
        sink::{DelimitedFileSink, SinkWriter},
        source::{PageFetcher, PagedSource},
    },
    metrics::Metrics,
};
use engine_processing::{
    chunk::{ChunkAssembler, ChunkOutcome},
    stage::AsyncTransformStage,
    transform::Transformer,
};
use model::core::identifiers::RunId;
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One run of the batch job: read, transform and write chunk after chunk until
/// the source is exhausted or a chunk fails.
///
/// Chunks committed before a failure stay on disk; nothing is rolled back.
pub struct Engine<W: SinkWriter> {
    source: PagedSource,
    transformer: Arc<dyn Transformer>,
    writer: W,
    settings: RunSettings,
    cancel: CancellationToken,
    metrics: Metrics,
}

impl Engine<DelimitedFileSink> {
    /// Builds an engine that pages `fetcher` and writes the delimited file
    /// described by `settings.output`.
    pub async fn from_settings(
        fetcher: Arc<dyn PageFetcher>,
        transformer: Arc<dyn Transformer>,
        settings: RunSettings,
    ) -> Result<Self, EngineError> {
        settings.validate()?;

        let output = &settings.output;
        let aggregator = output.aggregator().map_err(SettingsError::from)?;
        let writer = DelimitedFileSink::open(&output.path, aggregator, output.mode)
            .await
            .map_err(|source| EngineError::Output {
                path: output.path.clone(),
                source,
            })?;
        let source = PagedSource::new(fetcher, settings.page_size, settings.sort_key);

        Ok(Self::new(source, transformer, writer, settings))
    }
}

impl<W: SinkWriter> Engine<W> {
    pub fn new(
        source: PagedSource,
        transformer: Arc<dyn Transformer>,
        writer: W,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            transformer,
            writer,
            settings,
            cancel: CancellationToken::new(),
            metrics: Metrics::new(),
        }
    }

    /// Stops the run at the next chunk boundary once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    pub async fn run(self, run_id: RunId) -> Result<RunSummary, RunFailure> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let metrics = self.metrics.clone();

        info!(
            run_id = %run_id,
            chunk_size = self.settings.chunk_size,
            page_size = self.settings.page_size,
            sort_key = %self.settings.sort_key,
            "Run started"
        );

        let result = self.execute().await;

        let status = match result {
            Ok(()) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };
        let summary = RunSummary::new(
            run_id,
            status,
            metrics.snapshot(),
            started_at,
            clock.elapsed(),
        );

        match result {
            Ok(()) => {
                info!(
                    run_id = %run_id,
                    chunks = summary.chunks_committed,
                    records = summary.records_written,
                    duration_ms = summary.elapsed.as_millis(),
                    "Run completed"
                );
                Ok(summary)
            }
            Err(error) => {
                error!(
                    run_id = %run_id,
                    chunks = summary.chunks_committed,
                    error = %error,
                    "Run failed"
                );
                Err(RunFailure { summary, error })
            }
        }
    }

    async fn execute(self) -> Result<(), EngineError> {
        let stage = AsyncTransformStage::new(
            self.settings.pool.clone(),
            self.transformer,
            self.metrics.clone(),
        )?;
        let mut assembler = ChunkAssembler::new(
            self.source,
            stage,
            self.writer,
            self.settings.chunk_size,
            self.metrics,
        );

        let outcome = loop {
            if self.cancel.is_cancelled() {
                let after_chunks = assembler.next_index().value();
                warn!(after_chunks, "Cancellation requested, stopping at chunk boundary");
                break Err(EngineError::Cancelled { after_chunks });
            }

            match assembler.process_next().await {
                Ok(ChunkOutcome::Committed(_)) => continue,
                Ok(ChunkOutcome::Exhausted) => break Ok(()),
                Err(e) => break Err(EngineError::from(e)),
            }
        };

        // Joining the workers blocks, so keep it off the async runtime.
        let (_, stage, _) = assembler.into_parts();
        let shutdown = tokio::task::spawn_blocking(move || stage.shutdown()).await;

        outcome?;
        shutdown?;
        Ok(())
    }
}
