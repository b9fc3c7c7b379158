//! Pooling of worker threads and reusable processors.
//!
//! This module provides two independent pooling mechanisms:
//!
//! - Worker pools that run deferred tasks on long-lived threads
//! - Processor pools that reuse expensive-to-build processing instances

pub mod processor;
pub mod worker;

// Re-export key types from processor
pub use processor::{ProcessError, Processor, ProcessorHandle, ProcessorPool};

// Re-export key types from worker
pub use worker::{PoolError, WorkerPool, WorkerPoolConfig, WorkerPoolStats};
