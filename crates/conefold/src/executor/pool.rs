//! Fixed-size worker pool draining one FIFO queue.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use super::{Executor, Task};
use crate::error::{FoldError, Result};

/// Worker count used when the platform cannot report its parallelism.
const FALLBACK_WORKERS: usize = 4;

struct Queue {
    tasks: VecDeque<Task>,
    stopped: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    not_empty: Condvar,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
    /// Tasks waiting in the queue.
    pub pending: usize,
}

/// A fixed set of worker threads sharing one task queue.
///
/// `enqueue` appends and wakes one worker. Dropping the pool lets the
/// workers drain whatever is still queued, then joins them; no task is
/// ever discarded.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Start `workers` threads.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(FoldError::NoWorkers);
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                stopped: false,
            }),
            not_empty: Condvar::new(),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(workers),
        };
        for id in 0..workers {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("conefold-worker-{}", id))
                .spawn(move || worker_loop(&shared))?;
            pool.workers.push(handle);
        }

        tracing::debug!(workers, "Thread pool started");
        Ok(pool)
    }

    /// Start one worker per available hardware thread.
    pub fn with_default_concurrency() -> Result<Self> {
        Self::new(default_concurrency())
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            completed: self.shared.completed.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
            pending: self.shared.queue.lock().tasks.len(),
        }
    }
}

impl Executor for ThreadPool {
    fn enqueue(&self, task: Task) {
        self.shared.queue.lock().tasks.push_back(task);
        self.shared.not_empty.notify_one();
    }

    fn concurrency(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.queue.lock().stopped = true;
        self.shared.not_empty.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Worker thread terminated abnormally");
            }
        }

        tracing::debug!(
            completed = self.shared.completed.load(Ordering::Relaxed),
            "Thread pool stopped"
        );
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Hardware threads, or a small fixed count if unknown.
pub fn default_concurrency() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_WORKERS)
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                if queue.stopped {
                    return;
                }
                shared.not_empty.wait(&mut queue);
            }
        };

        match catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                shared.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker = thread::current().name().unwrap_or("?"),
                    "Task panicked"
                );
            }
        }
    }
}
