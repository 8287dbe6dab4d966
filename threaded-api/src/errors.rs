//! # Error Types
//!
//! This module defines the error types used by every layer of the `threaded`
//! workspace. The layer itself only originates configuration and lifecycle
//! errors; failures of the wrapped target functions are relayed as-is through
//! the returned result handles.
//!
//! ## Core Components
//!
//! - `ConfigurationError`: executor construction rejected the requested capacity
//! - `PoolError`: submission refused by an executor (e.g. after shutdown)
//! - `TaskError`: the state a pending result can fail with
//! - `ThreadedError`: umbrella error returned by decorator call sites
//!
//! ## Usage Example
//!
//! ```rust
//! use threaded_api::errors::{PoolError, TaskError};
//!
//! fn describe(error: TaskError) -> String {
//!     match error {
//!         TaskError::Submit(PoolError::Shutdown) => "executor already shut down".to_string(),
//!         TaskError::Panicked(msg) => format!("target panicked: {}", msg),
//!         other => other.to_string(),
//!     }
//! }
//! ```

use std::any::Any;

use thiserror::Error;

/// Error raised while creating or reconfiguring an executor.
///
/// Surfaced immediately to the configuring caller and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The pool constructor rejected the requested number of workers.
    #[error("Invalid executor capacity: {0} (at least one worker is required)")]
    InvalidCapacity(usize),

    /// The runtime backing a blocking pool could not be built.
    #[error("Failed to build executor runtime: {0}")]
    RuntimeBuild(String),
}

/// Errors returned by an executor when it refuses a job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Submission attempted after or during shutdown.
    #[error("Cannot schedule new work after executor shutdown")]
    Shutdown,

    /// No worker thread could be started to run the job.
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Failure states of a pending result.
///
/// Only `Panicked` carries information about the target function itself;
/// every other variant describes what happened to the job around it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The job was cancelled before a worker picked it up.
    #[error("Task was cancelled before it started")]
    Cancelled,

    /// The target function panicked while running on its worker.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The executor dropped the job without running it.
    #[error("Task was abandoned by its executor")]
    Abandoned,

    /// The executor refused the job.
    #[error("Task submission failed: {0}")]
    Submit(#[from] PoolError),

    /// No executor could be obtained for the job.
    #[error("Executor unavailable: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A throwaway runtime for an async target could not be created.
    #[error("Failed to drive async target to completion: {0}")]
    Bridge(String),

    /// The runtime task awaiting the job failed.
    #[error("Failed to join task: {0}")]
    Join(String),
}

/// Umbrella error for decorator call sites.
#[derive(Error, Debug)]
pub enum ThreadedError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Task(#[from] TaskError),

    /// Called outside of a tokio runtime without an explicit loop.
    #[error("No event loop available: not inside a tokio runtime and no loop was configured")]
    NoEventLoop,

    #[error("Failed to spawn thread {name:?}: {reason}")]
    ThreadSpawn { name: String, reason: String },

    #[error("Thread {0:?} was already started")]
    AlreadyStarted(String),

    #[error("Thread {0:?} was never started")]
    NotStarted(String),

    #[error("Internal error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
