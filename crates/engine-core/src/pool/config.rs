use crate::error::PoolError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// What happens to a submission when the queue is full and every worker the
/// pool may start is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Run the task on the submitting thread. The producer stalls for the
    /// duration of the transform, which is the pool's backpressure.
    #[default]
    CallerRuns,
    /// Fail the submission's handle immediately with a rejection error.
    Abort,
}

impl FromStr for RejectionPolicy {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "caller_runs" => Ok(RejectionPolicy::CallerRuns),
            "abort" => Ok(RejectionPolicy::Abort),
            other => Err(PoolError::InvalidConfig(format!(
                "unknown rejection policy '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RejectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionPolicy::CallerRuns => f.write_str("caller_runs"),
            RejectionPolicy::Abort => f.write_str("abort"),
        }
    }
}

/// Sizing of the transform worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Workers started with the pool and kept for its lifetime.
    pub core_size: usize,
    /// Upper bound on workers; extra workers are started only when the queue is full.
    pub max_size: usize,
    /// Tasks that may wait for a worker. Zero hands tasks over directly.
    pub queue_capacity: usize,
    pub rejection_policy: RejectionPolicy,
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_size: 100,
            max_size: 100,
            queue_capacity: 100,
            rejection_policy: RejectionPolicy::CallerRuns,
            thread_name_prefix: "batch-worker-".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn with_sizes(mut self, core_size: usize, max_size: usize) -> Self {
        self.core_size = core_size;
        self.max_size = max_size;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Upper bound on transforms in flight at once, counting one running on the caller.
    pub fn max_in_flight(&self) -> usize {
        self.max_size + self.queue_capacity + 1
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfig(
                "max pool size must be at least 1".into(),
            ));
        }
        if self.core_size > self.max_size {
            return Err(PoolError::InvalidConfig(format!(
                "core pool size {} exceeds max pool size {}",
                self.core_size, self.max_size
            )));
        }
        Ok(())
    }
}
