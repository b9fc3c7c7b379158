//! Worker pool for executing deferred tasks on a fixed set of threads.
//!
//! The pool owns a FIFO task queue guarded by one mutex and one condition
//! variable. Idle workers block on the condition; shutdown broadcasts to
//! every waiter and joins each worker before returning.

use log::{debug, error, info, trace};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Error returned by worker pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool was configured without any workers
    #[error("worker pool requires at least one worker")]
    InvalidWorkerCount,

    /// The pool is shut down and no longer accepts tasks
    #[error("worker pool is shut down")]
    ShuttingDown,
}

/// Configuration for a worker pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads
    pub workers: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            thread_name_prefix: "workpool-worker".to_string(),
        }
    }
}

/// Counters describing pool activity
#[derive(Debug, Default, Clone)]
pub struct WorkerPoolStats {
    /// Number of tasks accepted by submit
    pub tasks_submitted: usize,

    /// Number of tasks that ran to completion
    pub tasks_completed: usize,

    /// Number of tasks that panicked
    pub tasks_panicked: usize,
}

/// A deferred, zero-argument unit of work
type Task = Box<dyn FnOnce() + Send + 'static>;

/// Queue and shutdown flag, mutated only under the pool's one lock
struct Shared {
    queue: VecDeque<Task>,
    disposed: bool,
}

/// State shared between the pool handle and its worker threads
struct Inner {
    shared: Mutex<Shared>,
    available: Condvar,
    tasks_completed: AtomicUsize,
    tasks_panicked: AtomicUsize,
}

/// A fixed-size pool of long-lived worker threads.
///
/// Workers start at construction and block until work arrives. Tasks are
/// dequeued in FIFO order and executed outside the lock, so a slow or
/// panicking task never blocks other workers from dequeuing or from
/// observing shutdown.
///
/// Shutdown is synchronous: [`WorkerPool::shutdown`] wakes every worker
/// and joins all of them before returning. Tasks still queued when
/// shutdown begins are abandoned, not drained. Dropping the pool shuts
/// it down the same way.
///
/// # Example
///
/// ```
/// use workpool::WorkerPool;
/// use std::sync::mpsc;
///
/// let pool = WorkerPool::new(2).unwrap();
///
/// let (tx, rx) = mpsc::channel();
/// pool.submit(move || tx.send(7).unwrap()).unwrap();
/// assert_eq!(rx.recv().unwrap(), 7);
///
/// pool.shutdown();
/// ```
pub struct WorkerPool {
    /// State shared with the workers
    inner: Arc<Inner>,

    /// Join handles, drained by whichever shutdown caller gets there first
    workers: Mutex<Vec<JoinHandle<()>>>,

    /// Number of workers started at construction
    worker_count: usize,

    /// Tasks accepted so far
    tasks_submitted: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool with the given number of workers and default naming.
    ///
    /// Fails fast with [`PoolError::InvalidWorkerCount`] when `workers`
    /// is zero; no threads are started in that case.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        Self::with_config(WorkerPoolConfig {
            workers,
            ..Default::default()
        })
    }

    /// Create a pool with the specified configuration.
    pub fn with_config(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        if config.workers == 0 {
            return Err(PoolError::InvalidWorkerCount);
        }

        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared {
                queue: VecDeque::new(),
                disposed: false,
            }),
            available: Condvar::new(),
            tasks_completed: AtomicUsize::new(0),
            tasks_panicked: AtomicUsize::new(0),
        });

        info!("Creating worker pool with {} workers", config.workers);

        let mut handles = Vec::with_capacity(config.workers);

        for id in 0..config.workers {
            let thread_name = format!("{}-{}", config.thread_name_prefix, id);
            let inner = Arc::clone(&inner);

            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || Self::worker_loop(id, inner))
                .expect("Failed to spawn worker thread");

            handles.push(handle);
        }

        Ok(Self {
            inner,
            workers: Mutex::new(handles),
            worker_count: config.workers,
            tasks_submitted: AtomicUsize::new(0),
        })
    }

    /// Worker thread main loop
    fn worker_loop(id: usize, inner: Arc<Inner>) {
        debug!("Worker {}: starting", id);

        loop {
            let task = {
                let mut shared = inner.shared.lock();
                loop {
                    if shared.disposed {
                        debug!("Worker {}: shutting down", id);
                        return;
                    }

                    if let Some(task) = shared.queue.pop_front() {
                        break task;
                    }

                    // Atomically releases the lock while waiting. State is
                    // re-checked on wake; the condition never implies work
                    // is present (spurious and overlapping wakeups).
                    inner.available.wait(&mut shared);
                }
            };

            trace!("Worker {}: executing task", id);

            // Run outside the lock, and keep the worker alive if the
            // task panics.
            match catch_unwind(AssertUnwindSafe(move || task())) {
                Ok(()) => {
                    inner.tasks_completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    error!(
                        "Worker {}: task panicked: {:?}",
                        id,
                        payload.downcast_ref::<&str>().unwrap_or(&"<unknown panic>")
                    );
                    inner.tasks_panicked.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Submit a task for execution on some worker.
    ///
    /// Appends to the tail of the queue and returns immediately; there is
    /// no back-pressure. Tasks submitted in sequence by one caller run in
    /// that order relative to each other. Once the pool is shut down,
    /// submission is rejected with [`PoolError::ShuttingDown`].
    pub fn submit<F>(&self, f: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut shared = self.inner.shared.lock();

            if shared.disposed {
                return Err(PoolError::ShuttingDown);
            }

            shared.queue.push_back(Box::new(f));

            // Wake one worker only on the empty -> non-empty transition.
            // A burst of submissions needs one wakeup; workers that are
            // already running drain the rest when they loop back.
            if shared.queue.len() == 1 {
                self.inner.available.notify_one();
            }
        }

        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Shut the pool down and wait for every worker to exit.
    ///
    /// Idempotent and safe to call concurrently: the first caller to
    /// observe the running state performs the single broadcast, and all
    /// callers return only after every worker thread has been joined.
    /// Tasks still queued when shutdown begins are abandoned; a task
    /// already executing finishes first.
    pub fn shutdown(&self) {
        {
            let mut shared = self.inner.shared.lock();
            if !shared.disposed {
                info!("Shutting down worker pool");
                shared.disposed = true;
                // Broadcast: every waiter must observe shutdown, not
                // just one.
                self.inner.available.notify_all();
            }
        }

        // Every shutdown caller funnels through the handle mutex, so a
        // late caller blocks here until the join pass finishes and then
        // finds nothing left to join.
        let mut handles = self.workers.lock();
        for handle in handles.drain(..) {
            handle.join().unwrap_or_else(|payload| {
                error!("Worker thread panicked during shutdown: {:?}", payload);
            });
        }
    }

    /// Number of worker threads this pool was built with
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether shutdown has started
    pub fn is_disposed(&self) -> bool {
        self.inner.shared.lock().disposed
    }

    /// Get the current activity counters for this pool
    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.inner.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: self.inner.tasks_panicked.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
