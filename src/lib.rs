#![deny(warnings)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Workpool
//!
//! Fixed-size worker pools and reusable processor pools.
//!
//! This crate provides:
//!
//! - A worker pool that executes deferred tasks on a bounded set of
//!   long-lived threads, with graceful synchronous shutdown
//! - A processor pool that reuses stateless-between-uses processing
//!   instances from a lock-free free-list
//! - A host-wide process guard for single-instance entry flows

/// Pooling of worker threads and reusable processors
pub mod pool;

/// Host-level synchronization helpers
pub mod sync;

// Re-export key types for easier access
pub use pool::processor::{ProcessError, Processor, ProcessorPool};
pub use pool::worker::{PoolError, WorkerPool, WorkerPoolConfig};
pub use sync::guard::ProcessGuard;
