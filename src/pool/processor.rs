//! Processor pooling for reuse of expensive-to-build processing instances.
//!
//! A grow-only, lock-free free-list. Checkout never blocks: an empty
//! free-list means a fresh instance is built on demand. A checked-out
//! processor goes back to the free-list on every exit path, including
//! failure, so no instance is ever held by two callers at once.

use crossbeam_queue::SegQueue;
use log::{debug, trace};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Error produced by a processor run
#[derive(Error, Debug)]
#[error("processing failed: {0}")]
pub struct ProcessError(String);

impl ProcessError {
    /// Create a new process error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A reusable processing instance.
///
/// Implementations must be stateless between uses: after `process`
/// returns, whether `Ok` or `Err`, the instance is safe to hand to the
/// next caller.
pub trait Processor: Send + 'static {
    /// Build a fresh instance
    fn create() -> Self;

    /// Run the processor over one input
    fn process(&mut self, data: &[u8]) -> Result<(), ProcessError>;
}

/// A handle to a checked-out processor that returns it to the free-list
/// when dropped.
pub struct ProcessorHandle<P: Processor> {
    /// The processor, present until returned
    processor: Option<P>,

    /// Back-reference to the owning pool
    pool: Weak<ProcessorPool<P>>,
}

impl<P: Processor> ProcessorHandle<P> {
    /// Get a reference to the processor
    pub fn get(&self) -> &P {
        self.processor.as_ref().expect("Processor missing")
    }

    /// Get a mutable reference to the processor
    pub fn get_mut(&mut self) -> &mut P {
        self.processor.as_mut().expect("Processor missing")
    }
}

impl<P: Processor> Drop for ProcessorHandle<P> {
    fn drop(&mut self) {
        if let Some(processor) = self.processor.take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.return_processor(processor);
            }
            // Pool no longer exists: the processor is simply dropped.
        }
    }
}

impl<P: Processor + fmt::Debug> fmt::Debug for ProcessorHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.processor {
            Some(processor) => write!(f, "ProcessorHandle({:?})", processor),
            None => write!(f, "ProcessorHandle(returned)"),
        }
    }
}

/// A pool of reusable processors backed by a lock-free free-list.
///
/// The free-list starts empty, grows on demand and never shrinks. An
/// instance is either checked out by exactly one caller or resting in
/// the free-list, never both.
pub struct ProcessorPool<P: Processor> {
    /// Available processors
    free: SegQueue<P>,

    /// Total number of processors ever built
    created: AtomicUsize,
}

impl<P: Processor> ProcessorPool<P> {
    /// Create an empty pool. Instances are built lazily on first use.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            free: SegQueue::new(),
            created: AtomicUsize::new(0),
        })
    }

    /// Check out a processor, reusing a free one when available.
    ///
    /// Never blocks and never fails; an empty free-list means a new
    /// instance is built.
    pub fn checkout(self: &Arc<Self>) -> ProcessorHandle<P> {
        let processor = match self.free.pop() {
            Some(processor) => {
                trace!("Reusing pooled processor");
                processor
            }
            None => {
                debug!("Creating processor on demand");
                self.created.fetch_add(1, Ordering::Relaxed);
                P::create()
            }
        };

        ProcessorHandle {
            processor: Some(processor),
            pool: Arc::downgrade(self),
        }
    }

    /// Process one input on a pooled processor.
    ///
    /// The processor goes back to the free-list on every exit path,
    /// including failure, before any error reaches the caller.
    pub fn process(self: &Arc<Self>, data: &[u8]) -> Result<(), ProcessError> {
        let mut handle = self.checkout();
        handle.get_mut().process(data)
    }

    /// Number of processors currently resting in the free-list
    pub fn available_count(&self) -> usize {
        self.free.len()
    }

    /// Total number of processors ever built by this pool
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Return a processor to the free-list
    fn return_processor(&self, processor: P) {
        self.free.push(processor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[derive(Debug, Default)]
    struct TestProcessor {
        calls: usize,
    }

    impl Processor for TestProcessor {
        fn create() -> Self {
            Self::default()
        }

        fn process(&mut self, data: &[u8]) -> Result<(), ProcessError> {
            self.calls += 1;
            match data {
                b"fail" => Err(ProcessError::new("bad input")),
                b"panic" => panic!("processor blew up"),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn sequential_calls_reuse_one_instance() {
        let pool = ProcessorPool::<TestProcessor>::new();

        for _ in 0..100 {
            pool.process(b"data").unwrap();
            // At rest there is never more than the one instance.
            assert_eq!(pool.available_count(), 1);
        }

        assert_eq!(pool.created_count(), 1);
    }

    #[test]
    fn failure_propagates_after_return_to_pool() {
        let pool = ProcessorPool::<TestProcessor>::new();

        let result = pool.process(b"fail");
        assert!(result.is_err());

        // The instance came back despite the failure and is reused.
        assert_eq!(pool.available_count(), 1);
        pool.process(b"ok").unwrap();
        assert_eq!(pool.created_count(), 1);
    }

    #[test]
    fn unwind_still_returns_the_processor() {
        let pool = ProcessorPool::<TestProcessor>::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _ = pool.process(b"panic");
        }));
        assert!(result.is_err());

        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn overlapping_checkouts_use_distinct_instances() {
        let pool = ProcessorPool::<TestProcessor>::new();

        let first = pool.checkout();
        let second = pool.checkout();
        assert_eq!(pool.created_count(), 2);
        assert_eq!(pool.available_count(), 0);

        drop(first);
        drop(second);
        assert_eq!(pool.available_count(), 2);

        // Further checkouts draw from the free-list.
        let _third = pool.checkout();
        assert_eq!(pool.created_count(), 2);
    }

    #[test]
    fn handle_debug_reflects_checkout_state() {
        let pool = ProcessorPool::<TestProcessor>::new();
        let handle = pool.checkout();
        assert!(format!("{:?}", handle).starts_with("ProcessorHandle("));
    }
}
