use crate::transform::Transformer;
use engine_core::{
    error::{PoolError, TransformError},
    metrics::Metrics,
    pool::{
        PoolConfig, RejectionPolicy, Rejected, Task, TransformHandle, WorkerPool,
        handle::{self, HandleCompleter},
    },
};
use model::records::record::Record;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use tracing::{debug, warn};

/// Dispatches transforms onto a bounded worker pool, one handle per record.
///
/// Submission never waits for a free worker. When the pool is saturated the
/// rejection policy applies: with `CallerRuns` the transform executes inline
/// on the submitting task, which throttles the reader to the pool's pace and
/// caps in-flight work at `max_size + queue_capacity + 1`.
pub struct AsyncTransformStage {
    pool: WorkerPool,
    transformer: Arc<dyn Transformer>,
    policy: RejectionPolicy,
    metrics: Metrics,
}

impl AsyncTransformStage {
    pub fn new(
        config: PoolConfig,
        transformer: Arc<dyn Transformer>,
        metrics: Metrics,
    ) -> Result<Self, PoolError> {
        let policy = config.rejection_policy;
        let pool = WorkerPool::new(config)?;
        Ok(Self {
            pool,
            transformer,
            policy,
            metrics,
        })
    }

    pub fn policy(&self) -> RejectionPolicy {
        self.policy
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Starts the transform of `record`, which occupies `slot` in its chunk.
    pub fn submit(&mut self, slot: usize, record: Record) -> TransformHandle {
        let (completer, handle) = handle::channel(slot, record.id);
        let record_id = record.id;
        let transformer = Arc::clone(&self.transformer);
        let task: Task = Box::new(move || run_transform(transformer.as_ref(), record, completer));

        match self.pool.try_execute(task) {
            Ok(()) => handle,
            Err(Rejected(task)) => match self.policy {
                RejectionPolicy::CallerRuns => {
                    debug!(record_id, slot, "Pool saturated, transforming on caller");
                    self.metrics.increment_caller_runs();
                    task();
                    handle
                }
                RejectionPolicy::Abort => {
                    warn!(record_id, slot, "Pool saturated, rejecting record");
                    self.metrics.increment_rejections();
                    // Dropping the task releases its completer; the returned
                    // handle carries the rejection instead.
                    drop(task);
                    TransformHandle::failed(slot, TransformError::Rejected { id: record_id })
                }
            },
        }
    }

    /// Stops the pool after queued transforms have drained. Blocks the caller.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}

fn run_transform(transformer: &dyn Transformer, record: Record, completer: HandleCompleter) {
    completer.mark_running();
    let id = record.id;

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| transformer.transform(record))) {
        Ok(result) => result,
        Err(payload) => Err(TransformError::Panicked {
            id,
            message: panic_message(payload.as_ref()),
        }),
    };

    completer.complete(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
