use crate::error::TransformError;
use model::records::record::Record;
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};
use tokio::sync::oneshot;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const FAILED: u8 = 3;

pub type TransformOutcome = Result<Record, TransformError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl HandleStatus {
    fn from_raw(raw: u8) -> Self {
        match raw {
            PENDING => HandleStatus::Pending,
            RUNNING => HandleStatus::Running,
            COMPLETED => HandleStatus::Completed,
            _ => HandleStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HandleStatus::Completed | HandleStatus::Failed)
    }
}

/// Creates a connected completer/handle pair for the record in `slot`.
pub fn channel(slot: usize, record_id: i64) -> (HandleCompleter, TransformHandle) {
    let status = Arc::new(AtomicU8::new(PENDING));
    let (tx, rx) = oneshot::channel();

    let completer = HandleCompleter {
        record_id,
        status: Arc::clone(&status),
        tx: Some(tx),
    };
    let handle = TransformHandle {
        slot,
        record_id,
        status,
        rx,
    };
    (completer, handle)
}

/// The consumer side of a single record's transform.
///
/// Resolves exactly once, to the transformed record or the error that
/// replaced it.
#[derive(Debug)]
pub struct TransformHandle {
    slot: usize,
    record_id: i64,
    status: Arc<AtomicU8>,
    rx: oneshot::Receiver<TransformOutcome>,
}

impl TransformHandle {
    /// A handle that is already failed, for submissions refused by the pool.
    pub fn failed(slot: usize, error: TransformError) -> Self {
        let (completer, handle) = channel(slot, error.record_id());
        completer.complete(Err(error));
        handle
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn status(&self) -> HandleStatus {
        HandleStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    /// Suspends until the transform reaches its terminal state.
    pub async fn wait(self) -> TransformOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransformError::Abandoned { id: self.record_id }),
        }
    }
}

/// The producer side of a handle. Consumed on completion, so a terminal state
/// is assigned at most once; dropping it unfinished fails the handle.
#[derive(Debug)]
pub struct HandleCompleter {
    record_id: i64,
    status: Arc<AtomicU8>,
    tx: Option<oneshot::Sender<TransformOutcome>>,
}

impl HandleCompleter {
    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn mark_running(&self) {
        let _ = self
            .status
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn complete(mut self, outcome: TransformOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: TransformOutcome) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let terminal = if outcome.is_ok() { COMPLETED } else { FAILED };
        self.status.store(terminal, Ordering::Release);
        // The handle may already be gone if its chunk was abandoned.
        let _ = tx.send(outcome);
    }
}

impl Drop for HandleCompleter {
    fn drop(&mut self) {
        if self.tx.is_some() {
            let id = self.record_id;
            self.finish(Err(TransformError::Abandoned { id }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_walks_through_states() {
        let (completer, handle) = channel(0, 1);
        assert_eq!(handle.status(), HandleStatus::Pending);

        completer.mark_running();
        assert_eq!(handle.status(), HandleStatus::Running);

        completer.complete(Ok(Record::new(1, "R1", "A")));
        assert_eq!(handle.status(), HandleStatus::Completed);
        assert_eq!(handle.wait().await.unwrap(), Record::new(1, "R1", "A"));
    }

    #[tokio::test]
    async fn dropped_completer_fails_the_handle() {
        let (completer, handle) = channel(3, 9);
        drop(completer);

        assert_eq!(handle.status(), HandleStatus::Failed);
        assert_eq!(handle.slot(), 3);
        assert_eq!(
            handle.wait().await,
            Err(TransformError::Abandoned { id: 9 })
        );
    }

    #[tokio::test]
    async fn prefailed_handle_carries_error() {
        let handle = TransformHandle::failed(2, TransformError::Rejected { id: 5 });
        assert_eq!(handle.record_id(), 5);
        assert!(handle.status().is_terminal());
        assert_eq!(handle.wait().await, Err(TransformError::Rejected { id: 5 }));
    }

    #[test]
    fn completion_from_another_thread_is_observed() {
        let (completer, handle) = channel(0, 4);
        std::thread::spawn(move || {
            completer.mark_running();
            completer.complete(Err(TransformError::failed(4, "bad roll number")));
        })
        .join()
        .unwrap();

        let outcome = futures::executor::block_on(handle.wait());
        assert_eq!(outcome, Err(TransformError::failed(4, "bad roll number")));
    }
}
