//! Task executors.
//!
//! The grid never spawns threads. It hands zero-argument tasks to an
//! [`Executor`], which either runs them on the spot or queues them for a
//! pool of workers. The same dependency graph can therefore be replayed
//! sequentially and in parallel and the results compared.

mod pool;
mod semaphore;

pub use pool::{default_concurrency, PoolStats, ThreadPool};
pub use semaphore::CountingSemaphore;

/// A unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that eventually runs the tasks it is given.
///
/// Tasks must be started in the order they were enqueued. Grid tasks
/// block on their predecessors, so an executor that starts a later task
/// ahead of an earlier one can leave every worker waiting on work that
/// never started.
pub trait Executor: Send + Sync {
    /// Submit a task. Never blocks on backlog.
    fn enqueue(&self, task: Task);

    /// Number of tasks that may run at the same time.
    fn concurrency(&self) -> usize {
        1
    }
}

/// Runs every task immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    #[inline]
    fn enqueue(&self, task: Task) {
        task()
    }
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn enqueue(&self, task: Task) {
        (**self).enqueue(task)
    }

    fn concurrency(&self) -> usize {
        (**self).concurrency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_sequential_runs_inline() {
        let hits = Arc::new(AtomicUsize::new(0));
        let exec = SequentialExecutor;
        for i in 0..5 {
            let task_hits = Arc::clone(&hits);
            exec.enqueue(Box::new(move || {
                task_hits.fetch_add(1, Ordering::SeqCst);
            }));
            assert_eq!(hits.load(Ordering::SeqCst), i + 1);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 5);
        assert_eq!(exec.concurrency(), 1);
    }
}
