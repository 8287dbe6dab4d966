// Threaded Decorators
//
// This crate implements the `threaded-api` contracts: thread and blocking
// pool executors behind reconfigurable shared handles, and the decorators
// that route calls onto them, onto dedicated threads or onto runtime tasks.

pub mod bridge;
pub mod config;
pub mod decorator;
pub mod executor;
pub mod logging;

// Re-export commonly used types
pub use config::{ExecutorConfig, DEFAULT_WORKER_MULTIPLIER, THREADED_NAME_PREFIX};
pub use decorator::*;
pub use executor::{BlockingPoolExecutor, ExecutorHandle, ThreadPoolExecutor};
pub use threaded_api::{
    AsyncFn, CallWrapper, CancelHandle, ConfigurationError, Decorator, Executor, ExecutorKind, PoolError,
    PreparedFn, TaskError, TaskFuture, TaskResult, TaskStatus, ThreadedError,
};
