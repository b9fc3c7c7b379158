//! Host-level synchronization helpers.
//!
//! Currently this covers the single-instance process guard used to gate
//! entry flows that must not run twice on one host.

pub mod guard;

// Re-export key types from guard
pub use guard::{GuardError, ProcessGuard};
