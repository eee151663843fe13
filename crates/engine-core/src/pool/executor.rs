use crate::{error::PoolError, pool::config::PoolConfig};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
};
use tracing::{debug, info, warn};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A task the pool could not accept. The caller decides what to do with it
/// according to its rejection policy.
pub struct Rejected(pub Task);

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rejected(..)")
    }
}

/// A fixed set of named worker threads fed from a bounded queue.
///
/// `core_size` workers start with the pool. A new worker is started for a
/// submission when no worker exists yet or when the queue is full, until
/// `max_size` is reached; after that submissions are rejected. A submission
/// that starts a worker is that worker's first task.
pub struct WorkerPool {
    config: PoolConfig,
    queue_tx: Option<Sender<Task>>,
    queue_rx: Receiver<Task>,
    workers: Vec<JoinHandle<()>>,
    #[cfg(test)]
    refuse_spawns: bool,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let (queue_tx, queue_rx) = channel::bounded(config.queue_capacity);
        let mut pool = WorkerPool {
            queue_tx: Some(queue_tx),
            queue_rx,
            workers: Vec::with_capacity(config.max_size),
            config,
            #[cfg(test)]
            refuse_spawns: false,
        };

        for _ in 0..pool.config.core_size {
            pool.spawn_worker()?;
        }

        info!(
            core = pool.config.core_size,
            max = pool.config.max_size,
            queue = pool.config.queue_capacity,
            policy = %pool.config.rejection_policy,
            "Worker pool started"
        );
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Hands `task` to the pool without blocking.
    pub fn try_execute(&mut self, task: Task) -> Result<(), Rejected> {
        let Some(queue_tx) = self.queue_tx.as_ref() else {
            return Err(Rejected(task));
        };

        // A queued task needs a live worker to ever run.
        if self.workers.is_empty() {
            return self.grow(task);
        }

        let task = match queue_tx.try_send(task) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(task)) => task,
            Err(TrySendError::Disconnected(task)) => return Err(Rejected(task)),
        };

        if self.workers.len() >= self.config.max_size {
            return Err(Rejected(task));
        }
        self.grow(task)
    }

    /// Stops accepting work, lets workers drain the queue and joins them.
    pub fn shutdown(mut self) {
        self.queue_tx.take();
        let workers = std::mem::take(&mut self.workers);
        let count = workers.len();
        for worker in workers {
            if worker.join().is_err() {
                warn!("Worker thread terminated abnormally");
            }
        }
        debug!(workers = count, "Worker pool shut down");
    }

    /// Starts one more worker with `task` as its first job. The task is only
    /// handed over once the thread exists, so a failed spawn gives it back.
    fn grow(&mut self, task: Task) -> Result<(), Rejected> {
        match self.spawn_worker() {
            Ok(first) => first.send(task).map_err(|e| Rejected(e.into_inner())),
            Err(e) => {
                warn!(error = %e, "Could not grow worker pool");
                Err(Rejected(task))
            }
        }
    }

    /// Returns the sender for the new worker's first task. Dropping it unused
    /// sends the worker straight to the shared queue.
    fn spawn_worker(&mut self) -> Result<Sender<Task>, PoolError> {
        let name = format!("{}{}", self.config.thread_name_prefix, self.workers.len() + 1);

        #[cfg(test)]
        if self.refuse_spawns {
            return Err(PoolError::Spawn {
                name,
                source: std::io::Error::new(std::io::ErrorKind::WouldBlock, "spawn refused"),
            });
        }

        let (first_tx, first_rx) = channel::bounded(1);
        let queue = self.queue_rx.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(first_rx, queue))
            .map_err(|source| PoolError::Spawn { name, source })?;

        self.workers.push(handle);
        Ok(first_tx)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets detached workers finish once it drains.
        self.queue_tx.take();
    }
}

fn worker_loop(first: Receiver<Task>, queue: Receiver<Task>) {
    if let Ok(task) = first.recv() {
        run_task(task);
    }

    while let Ok(task) = queue.recv() {
        run_task(task);
    }
}

fn run_task(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        warn!("Task panicked inside worker; worker continues");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::config::PoolConfig;
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
            mpsc::{self, channel},
        },
        time::Duration,
    };
    use tracing_test::traced_test;

    fn config(core: usize, max: usize, queue: usize) -> PoolConfig {
        PoolConfig::default()
            .with_sizes(core, max)
            .with_queue_capacity(queue)
            .with_thread_name_prefix("test-worker-")
    }

    #[traced_test]
    #[test]
    fn runs_submitted_tasks_on_named_threads() {
        let mut pool = WorkerPool::new(config(2, 2, 4)).unwrap();
        let (tx, rx) = channel();

        for _ in 0..4 {
            let tx = tx.clone();
            pool.try_execute(Box::new(move || {
                let name = thread::current().name().map(str::to_string);
                tx.send(name).unwrap();
            }))
            .unwrap();
        }

        for _ in 0..4 {
            let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
            assert!(name.starts_with("test-worker-"), "unexpected thread {name}");
        }
        assert!(logs_contain("Worker pool started"));
        pool.shutdown();
    }

    #[test]
    fn grows_to_max_then_rejects() {
        let mut pool = WorkerPool::new(config(1, 2, 1)).unwrap();
        let (release_tx, release_rx) = channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let (started_tx, started_rx) = channel::<()>();

        let blocking =
            |release: Arc<Mutex<mpsc::Receiver<()>>>, started: mpsc::Sender<()>| -> Task {
                Box::new(move || {
                    started.send(()).unwrap();
                    let _ = release.lock().unwrap().recv();
                })
            };

        // Occupy the core worker.
        pool.try_execute(blocking(release_rx.clone(), started_tx.clone()))
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Fills the queue.
        pool.try_execute(Box::new(|| {})).unwrap();
        assert_eq!(pool.worker_count(), 1);

        // Queue full: a second worker is started for this one.
        pool.try_execute(blocking(release_rx.clone(), started_tx.clone()))
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(pool.worker_count(), 2);

        // Both workers busy and the no-op still occupies the queue.
        assert!(pool.try_execute(Box::new(|| {})).is_err());
        assert_eq!(pool.worker_count(), 2);

        drop(release_tx);
        pool.shutdown();
    }

    #[test]
    fn zero_core_pool_starts_a_worker_for_first_task() {
        let mut pool = WorkerPool::new(config(0, 4, 100)).unwrap();
        assert_eq!(pool.worker_count(), 0);

        let (tx, rx) = channel();
        for i in 0..5 {
            let tx = tx.clone();
            pool.try_execute(Box::new(move || tx.send(i).unwrap()))
                .unwrap();
        }

        let mut seen: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(pool.worker_count(), 1);
        pool.shutdown();
    }

    #[test]
    fn failed_spawn_hands_the_task_back() {
        let mut pool = WorkerPool::new(config(0, 2, 4)).unwrap();
        pool.refuse_spawns = true;

        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let Err(Rejected(task)) = pool.try_execute(Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        })) else {
            panic!("task was accepted without a worker");
        };
        assert_eq!(pool.worker_count(), 0);

        // The caller still owns the task and can run it itself.
        task();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let mut pool = WorkerPool::new(config(1, 1, 2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.try_execute(Box::new(|| panic!("boom"))).unwrap();
        let c = counter.clone();
        pool.try_execute(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_drains_queued_tasks() {
        let mut pool = WorkerPool::new(config(1, 1, 8)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let c = counter.clone();
            pool.try_execute(Box::new(move || {
                thread::sleep(Duration::from_millis(1));
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn invalid_config_is_refused() {
        assert!(WorkerPool::new(config(3, 1, 0)).is_err());
    }
}
