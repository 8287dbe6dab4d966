use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::{Builder, Runtime};
use tracing::debug;
use uuid::Uuid;

use threaded_api::{ConfigurationError, Executor, ExecutorKind, Job, PoolError};

/// Executor backed by the blocking pool of a dedicated tokio runtime.
///
/// At most `max_workers` jobs run concurrently. Shutdown is abrupt: it returns
/// immediately, jobs already running finish on their detached threads, and
/// queued jobs that had not started are dropped when a thread reaches them,
/// resolving their futures with `TaskError::Abandoned`.
pub struct BlockingPoolExecutor {
    id: Uuid,
    max_workers: usize,
    runtime: Mutex<Option<Runtime>>,
    is_shutdown: Arc<AtomicBool>,
}

impl BlockingPoolExecutor {
    pub fn new(max_workers: usize, name_prefix: impl Into<String>) -> Result<Self, ConfigurationError> {
        if max_workers == 0 {
            return Err(ConfigurationError::InvalidCapacity(max_workers));
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_workers)
            .thread_name(name_prefix)
            .enable_all()
            .build()
            .map_err(|e| ConfigurationError::RuntimeBuild(e.to_string()))?;

        let executor = Self {
            id: Uuid::new_v4(),
            max_workers,
            runtime: Mutex::new(Some(runtime)),
            is_shutdown: Arc::new(AtomicBool::new(false)),
        };
        debug!(executor_id = %executor.id, max_workers, "blocking pool created");
        Ok(executor)
    }

    fn runtime(&self) -> MutexGuard<'_, Option<Runtime>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Executor for BlockingPoolExecutor {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::BlockingPool
    }

    fn max_workers(&self) -> usize {
        self.max_workers
    }

    fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }

    fn execute(&self, job: Job) -> Result<(), PoolError> {
        let runtime = self.runtime();
        match runtime.as_ref() {
            Some(runtime) if !self.is_shutdown() => {
                let is_shutdown = self.is_shutdown.clone();
                // Detached: the result travels through the job's own channel.
                drop(runtime.spawn_blocking(move || {
                    if !is_shutdown.load(Ordering::Acquire) {
                        job();
                    }
                }));
                Ok(())
            }
            _ => Err(PoolError::Shutdown),
        }
    }

    fn close(&self) -> bool {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(runtime) = self.runtime().take() {
            runtime.shutdown_background();
        }
        debug!(executor_id = %self.id, "blocking pool shut down");
        true
    }

    fn join(&self) {}
}

impl Drop for BlockingPoolExecutor {
    fn drop(&mut self) {
        // Dropping a runtime from async context panics; shutdown_background never does.
        if let Some(runtime) = self.runtime().take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for BlockingPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingPoolExecutor")
            .field("id", &self.id)
            .field("max_workers", &self.max_workers)
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = BlockingPoolExecutor::new(0, "test").unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidCapacity(0));
    }

    #[test]
    fn test_execute_after_shutdown_refused() {
        let pool = BlockingPoolExecutor::new(2, "refuse").unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert_eq!(pool.execute(Box::new(|| {})), Err(PoolError::Shutdown));
    }

    #[test]
    fn test_queued_job_abandoned_on_shutdown() {
        use std::sync::mpsc;
        use std::time::Duration;

        use threaded_api::TaskError;

        let pool: Arc<dyn Executor> = Arc::new(BlockingPoolExecutor::new(1, "abandon").unwrap());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let running = pool
            .submit(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
                Ok(1)
            })
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let queued = pool.submit(|| Ok(2)).unwrap();

        pool.shutdown();
        release_tx.send(()).unwrap();

        assert_eq!(running.wait(), Ok(1));
        assert_eq!(queued.wait(), Err(TaskError::Abandoned));
    }
}
