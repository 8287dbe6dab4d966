//! # Threaded API
//!
//! Contracts for routing ordinary function calls onto background execution
//! targets: a shared pool, a freshly spawned thread or a runtime task.
//!
//! ## Design Principles
//!
//! - **Transparent relay**: failures of wrapped functions are handed back
//!   through the result handle untouched; the layer only originates
//!   configuration and lifecycle errors.
//! - **One interface, several primitives**: thread pools and runtime-backed
//!   blocking pools implement the same `Executor` trait.
//! - **Explicit decoration modes**: bare and configured decoration are two
//!   named constructors, never inferred from call shape.
//!
//! ## Module Organization
//!
//! - [`errors`]: error taxonomy
//! - [`executor`]: the executor contract and `ExecutorKind`
//! - [`task`]: `TaskFuture`, the pending result of a pooled call
//! - [`decorator`]: `Decorator` and `CallWrapper` traits

pub mod decorator;
pub mod errors;
pub mod executor;
pub mod task;

pub use decorator::{AsyncFn, CallWrapper, Decorator, PreparedFn};
pub use errors::{ConfigurationError, PoolError, TaskError, ThreadedError};
pub use executor::{Executor, ExecutorKind, Job};
pub use task::{CancelHandle, TaskCompleter, TaskFuture, TaskResult, TaskStatus};
