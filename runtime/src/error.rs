//! Runtime error types: what is fatal to a worker, and what is fatal to
//! the launch.
//!
//! Per-message failures (validation, handler errors) never appear here —
//! the dispatch loop logs and skips them. These types cover the faults
//! that mean the system cannot run correctly at all, and they carry the
//! cause chain the process reports before exiting non-zero.

use streambind_core::error::{ConfigurationError, LifecycleError, TransportError};
use thiserror::Error;

/// A fault that terminates one worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Shared-resource setup or scope violation. Fatal, never retried.
    #[error("lifecycle failure: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Broker unreachable after the retry policy was exhausted, or the
    /// subscription could not be established.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// A fault that fails the launch as a whole.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The application declaration or broker selection is invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A worker terminated with a fatal error (fail-fast; not restarted).
    #[error("worker {worker_id} failed: {source}")]
    Worker {
        /// Index of the failed worker.
        worker_id: usize,
        /// The worker's fatal fault.
        #[source]
        source: WorkerError,
    },
}
