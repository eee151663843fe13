use crate::{
    engine::Engine,
    error::{EngineError, RunFailure},
    summary::RunSummary,
};
use engine_core::connectors::sink::SinkWriter;
use model::core::identifiers::RunId;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Instrument, info_span, warn};

/// Hands out strictly increasing run ids.
#[derive(Debug, Default)]
pub struct RunIdIncrementer {
    last: AtomicU64,
}

impl RunIdIncrementer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues numbering after a previously issued id.
    pub fn starting_after(last: RunId) -> Self {
        Self {
            last: AtomicU64::new(last.value()),
        }
    }

    /// Issues the next id. Returns `None` once `u64::MAX` has been handed out;
    /// ids are never reused.
    pub fn next(&self) -> Option<RunId> {
        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .ok()
            .and_then(|previous| RunId::new(previous).next())
    }

    pub fn last(&self) -> Option<RunId> {
        match self.last.load(Ordering::SeqCst) {
            0 => None,
            id => Some(RunId::new(id)),
        }
    }
}

/// Starts engines under fresh run ids, each inside its own `run` span.
#[derive(Debug, Default)]
pub struct JobLauncher {
    ids: RunIdIncrementer,
}

impl JobLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_incrementer(ids: RunIdIncrementer) -> Self {
        Self { ids }
    }

    pub fn last_run_id(&self) -> Option<RunId> {
        self.ids.last()
    }

    pub async fn launch<W: SinkWriter>(&self, engine: Engine<W>) -> Result<RunSummary, RunFailure> {
        let Some(run_id) = self.ids.next() else {
            let last = RunId::new(u64::MAX);
            warn!(last_run_id = %last, "Run ids exhausted, refusing to launch");
            return Err(RunFailure::not_started(last, EngineError::RunIdsExhausted { last }));
        };
        let span = info_span!("run", run_id = %run_id);
        engine.run(run_id).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one() {
        let ids = RunIdIncrementer::new();
        assert_eq!(ids.last(), None);
        assert_eq!(ids.next(), Some(RunId::new(1)));
        assert_eq!(ids.next(), Some(RunId::new(2)));
        assert_eq!(ids.last(), Some(RunId::new(2)));
    }

    #[test]
    fn resumes_after_previous_run() {
        let ids = RunIdIncrementer::starting_after(RunId::new(41));
        assert_eq!(ids.next(), Some(RunId::new(42)));
    }

    #[test]
    fn exhausted_ids_are_never_repeated() {
        let ids = RunIdIncrementer::starting_after(RunId::new(u64::MAX - 1));
        assert_eq!(ids.next(), Some(RunId::new(u64::MAX)));
        assert_eq!(ids.next(), None);
        assert_eq!(ids.next(), None);
        assert_eq!(ids.last(), Some(RunId::new(u64::MAX)));
    }

    #[test]
    fn concurrent_callers_never_share_an_id() {
        let ids = std::sync::Arc::new(RunIdIncrementer::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..50).map(|_| ids.next().unwrap().value()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 200);
    }
}
