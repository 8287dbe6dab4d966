//! # Executor Contract
//!
//! Defines the interface every pooled execution target implements. Thread
//! pools and runtime-backed blocking pools are variants of the same
//! interface, selected by `ExecutorKind` rather than by subtyping.
//!
//! ## Core Components
//!
//! - `ExecutorKind`: which primitive backs an executor
//! - `Executor`: submit-a-job / shutdown contract
//! - `Job`: the type-erased unit of work executors accept
//!
//! Typed submission lives on `dyn Executor`:
//!
//! ```rust,ignore
//! let future = executor.submit(|| Ok(2 + 2))?;
//! assert_eq!(future.wait()?, 4);
//! ```

use std::fmt;

use uuid::Uuid;

use crate::errors::{PoolError, TaskError};
use crate::task::{TaskFuture, TaskResult};

/// Type-erased unit of work accepted by an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The primitive backing an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    /// Named OS worker threads. Shutdown drains queued work and joins the workers.
    ThreadPool,
    /// Blocking pool of a dedicated runtime. Shutdown is abrupt: it does not
    /// wait and queued jobs that never started are abandoned.
    BlockingPool,
}

impl ExecutorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorKind::ThreadPool => "thread_pool",
            ExecutorKind::BlockingPool => "blocking_pool",
        }
    }

    /// Whether `shutdown` waits for in-flight work to drain.
    pub fn drains_on_shutdown(&self) -> bool {
        matches!(self, ExecutorKind::ThreadPool)
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded set of workers running submitted jobs.
pub trait Executor: fmt::Debug + Send + Sync {
    /// Unique identity of this instance.
    fn id(&self) -> Uuid;

    fn kind(&self) -> ExecutorKind;

    /// Maximum number of jobs running concurrently.
    fn max_workers(&self) -> usize;

    fn is_shutdown(&self) -> bool;

    /// Queue `job` for execution. Never blocks the submitting thread.
    fn execute(&self, job: Job) -> Result<(), PoolError>;

    /// Stop accepting work without waiting for anything.
    ///
    /// Returns `true` for the call that actually closed the executor.
    fn close(&self) -> bool;

    /// Wait for in-flight work after `close`. A no-op for kinds that do not
    /// drain on shutdown.
    fn join(&self);

    /// `close` followed by `join`. Safe to call repeatedly.
    fn shutdown(&self) {
        self.close();
        self.join();
    }
}

impl dyn Executor {
    /// Submit `func` and get a handle to its result.
    pub fn submit<F, R>(&self, func: F) -> Result<TaskFuture<R>, PoolError>
    where
        F: FnOnce() -> TaskResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let (completer, future) = TaskFuture::channel();
        self.execute(Box::new(move || completer.run(func)))?;
        Ok(future)
    }

    /// Like `submit`, but a refused submission resolves the returned future
    /// with `TaskError::Submit` instead of failing the call.
    pub fn spawn<F, R>(&self, func: F) -> TaskFuture<R>
    where
        F: FnOnce() -> TaskResult<R> + Send + 'static,
        R: Send + 'static,
    {
        self.submit(func)
            .unwrap_or_else(|error| TaskFuture::failed(TaskError::Submit(error)))
    }
}
