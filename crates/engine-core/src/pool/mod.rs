pub mod config;
pub mod executor;
pub mod handle;

pub use config::{PoolConfig, RejectionPolicy};
pub use executor::{Rejected, Task, WorkerPool};
pub use handle::{HandleCompleter, HandleStatus, TransformHandle};
