//! Generic bounded worker pool.
//!
//! Executes arbitrary closures across a fixed set of persistent worker
//! threads. Submission returns a handle that can be awaited; when no worker
//! is idle the task waits in a priority queue (higher priority first, FIFO
//! within a priority). A panicking task fails only its own handle; the
//! worker slot is recovered and returns to pulling from the queue.
//!
//! This module is infrastructure with no video-specific knowledge; chunk
//! rendering is just one kind of task scheduled through it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tokio::sync::oneshot;

/// Hard cap on pool size. Each worker may drive a full render subprocess,
/// so memory is bounded by keeping this small regardless of core count.
pub const MAX_WORKERS: usize = 4;

/// Task priority. Larger values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Priority {
    pub const LOW: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(10);
    pub const HIGH: Priority = Priority(20);
}

/// Why a task handle did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The task body panicked; the worker slot was recovered.
    #[error("worker task panicked")]
    TaskPanicked,

    /// The pool was disposed before the task ran.
    #[error("worker pool disposed before task ran")]
    Rejected,
}

/// Awaitable result of a submitted task.
pub struct TaskHandle<R> {
    rx: oneshot::Receiver<Result<R, PoolError>>,
}

impl<R> TaskHandle<R> {
    /// Wait for the task to finish.
    pub async fn join(self) -> Result<R, PoolError> {
        self.rx.await.unwrap_or(Err(PoolError::Rejected))
    }

    /// Blocking variant for synchronous callers and tests.
    pub fn join_blocking(self) -> Result<R, PoolError> {
        self.rx.blocking_recv().unwrap_or(Err(PoolError::Rejected))
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueuedTask {
    priority: Priority,
    seq: u64,
    job: Job,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority wins, lower sequence number breaks ties
        // so equal-priority tasks keep submission order.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct PoolState {
    queue: BinaryHeap<QueuedTask>,
    next_seq: u64,
    disposed: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    available: Condvar,
}

/// A bounded pool of persistent worker threads.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool sized from hardware concurrency, capped at [`MAX_WORKERS`].
    pub fn from_hardware() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(parallelism.min(MAX_WORKERS))
    }

    /// Create a pool with exactly `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: BinaryHeap::new(),
                next_seq: 0,
                disposed: false,
            }),
            available: Condvar::new(),
        });

        let workers = (0..size)
            .map(|slot| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("reelcut-pool-{slot}"))
                    .spawn(move || worker_loop(slot, shared))
                    .expect("failed to spawn pool worker thread")
            })
            .collect();

        tracing::debug!(size, "Worker pool started");
        Self { shared, workers }
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Submit a task. Returns immediately with an awaitable handle.
    ///
    /// The handle resolves to [`PoolError::Rejected`] if the pool is (or
    /// becomes) disposed before the task runs, and to
    /// [`PoolError::TaskPanicked`] if the task body panics.
    pub fn execute<R, F>(&self, priority: Priority, task: F) -> TaskHandle<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(task));
            let outcome = match result {
                Ok(value) => Ok(value),
                Err(_) => {
                    tracing::warn!("Pool task panicked; failing its handle only");
                    Err(PoolError::TaskPanicked)
                }
            };
            // Receiver may have been dropped; nothing to do then.
            let _ = tx.send(outcome);
        });

        let mut state = self.shared.state.lock().expect("pool mutex poisoned");
        if state.disposed {
            // Dropping the job drops the sender, resolving the handle
            // with Rejected.
            drop(job);
            return TaskHandle { rx };
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(QueuedTask { priority, seq, job });
        drop(state);
        self.shared.available.notify_one();

        TaskHandle { rx }
    }

    /// Reject all queued tasks and stop all workers.
    ///
    /// Queued tasks resolve with [`PoolError::Rejected`]; in-flight tasks
    /// run to completion before their worker exits.
    pub fn dispose(mut self) {
        {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            state.disposed = true;
            state.queue.clear();
        }
        self.shared.available.notify_all();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        tracing::debug!("Worker pool disposed");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().expect("pool mutex poisoned");
        state.disposed = true;
        state.queue.clear();
        drop(state);
        self.shared.available.notify_all();
    }
}

fn worker_loop(slot: usize, shared: Arc<Shared>) {
    loop {
        let job = {
            let mut state = shared.state.lock().expect("pool mutex poisoned");
            loop {
                if let Some(task) = state.queue.pop() {
                    break task.job;
                }
                if state.disposed {
                    tracing::trace!(slot, "Pool worker exiting");
                    return;
                }
                state = shared
                    .available
                    .wait(state)
                    .expect("pool mutex poisoned");
            }
        };

        job();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    #[test]
    fn test_executes_tasks() {
        let pool = WorkerPool::new(2);
        let handle = pool.execute(Priority::NORMAL, || 21 * 2);
        assert_eq!(handle.join_blocking(), Ok(42));
        pool.dispose();
    }

    #[test]
    fn test_priority_order_is_respected() {
        // Single worker, blocked on a gate task, so queued order is observable.
        let pool = WorkerPool::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let gate = pool.execute(Priority::HIGH, || {
            std::thread::sleep(Duration::from_millis(50));
        });

        let mut handles = Vec::new();
        for (priority, tag) in [
            (Priority::LOW, "low"),
            (Priority::HIGH, "high-1"),
            (Priority::NORMAL, "normal"),
            (Priority::HIGH, "high-2"),
        ] {
            let order = Arc::clone(&order);
            handles.push(pool.execute(priority, move || {
                order.lock().unwrap().push(tag);
            }));
        }

        gate.join_blocking().unwrap();
        for handle in handles {
            handle.join_blocking().unwrap();
        }

        let seen = order.lock().unwrap().clone();
        assert_eq!(seen, vec!["high-1", "high-2", "normal", "low"]);
        pool.dispose();
    }

    #[test]
    fn test_panicking_task_fails_only_itself() {
        let pool = WorkerPool::new(1);

        let bad = pool.execute(Priority::NORMAL, || panic!("boom"));
        let good = pool.execute(Priority::NORMAL, || "still alive");

        assert_eq!(bad.join_blocking(), Err(PoolError::TaskPanicked));
        assert_eq!(good.join_blocking(), Ok("still alive"));
        pool.dispose();
    }

    #[test]
    fn test_dispose_rejects_queued_tasks() {
        let pool = WorkerPool::new(1);

        // Occupy the only worker long enough to guarantee queueing.
        let gate = pool.execute(Priority::NORMAL, || {
            std::thread::sleep(Duration::from_millis(100));
        });
        let queued = pool.execute(Priority::NORMAL, || 7);

        pool.dispose();

        gate.join_blocking().unwrap();
        assert_eq!(queued.join_blocking(), Err(PoolError::Rejected));
    }

    #[test]
    fn test_execute_after_dispose_semantics_via_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(2);
            for _ in 0..8 {
                let counter = Arc::clone(&counter);
                let _ = pool.execute(Priority::NORMAL, move || {
                    counter.fetch_add(1, AtomicOrdering::SeqCst);
                });
            }
            pool.dispose();
        }
        // Dispose joined the workers; anything that ran was counted exactly once.
        assert!(counter.load(AtomicOrdering::SeqCst) <= 8);
    }
}
