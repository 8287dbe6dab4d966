use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use tracing::debug;

use threaded_api::{ConfigurationError, Executor, ExecutorKind};

use crate::config::ExecutorConfig;
use crate::executor::{BlockingPoolExecutor, ThreadPoolExecutor};
use crate::log_executor;

lazy_static! {
    static ref THREAD_POOL_HANDLE: Arc<ExecutorHandle> =
        Arc::new(ExecutorHandle::new(ExecutorKind::ThreadPool));
    static ref BLOCKING_POOL_HANDLE: Arc<ExecutorHandle> =
        Arc::new(ExecutorHandle::new(ExecutorKind::BlockingPool));
}

type Slot = Option<Arc<dyn Executor>>;

/// Owner of a lazily created, reconfigurable executor.
///
/// Every pooled call site sharing a handle shares one executor and its
/// capacity limit. The process-wide handles are reached through
/// [`ExecutorHandle::global`]; isolated handles can be built with
/// [`ExecutorHandle::new`] and injected into decorators.
///
/// # Invariants
/// - At most one live executor per handle.
/// - `configure` with an unchanged capacity keeps the current instance.
/// - On a capacity change the old instance is closed before the new one is
///   installed. The create-or-replace sequence runs under the slot mutex,
///   so concurrent first access creates exactly one executor.
/// - Draining a replaced or shut down instance happens after the mutex is
///   released, so jobs still running on it can keep submitting through the
///   handle.
pub struct ExecutorHandle {
    config: ExecutorConfig,
    slot: Mutex<Slot>,
}

impl ExecutorHandle {
    pub fn new(kind: ExecutorKind) -> Self {
        Self::with_config(ExecutorConfig::new(kind))
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    /// The process-wide handle for `kind`.
    pub fn global(kind: ExecutorKind) -> Arc<ExecutorHandle> {
        match kind {
            ExecutorKind::ThreadPool => THREAD_POOL_HANDLE.clone(),
            ExecutorKind::BlockingPool => BLOCKING_POOL_HANDLE.clone(),
        }
    }

    pub fn kind(&self) -> ExecutorKind {
        self.config.kind
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Create the executor, or replace it if `max_workers` differs.
    ///
    /// `None` means the configured default (5 workers per CPU core unless the
    /// handle's config says otherwise). Fails only if the pool rejects the
    /// capacity, in which case the current instance is left untouched.
    pub fn configure(&self, max_workers: Option<usize>) -> Result<(), ConfigurationError> {
        let (_, replaced) = self.configure_locked(&mut self.lock_slot(), max_workers)?;
        drain(replaced);
        Ok(())
    }

    /// Shut down the current executor, if any. Idempotent.
    ///
    /// The next `get_executor` creates a fresh instance.
    pub fn shutdown(&self) {
        // Released before shutting down: a draining job may still reach the handle.
        let current = self.lock_slot().clone();
        if let Some(executor) = current {
            if !executor.is_shutdown() {
                log_executor!(self.kind(), "shutdown", executor_id = %executor.id());
                executor.shutdown();
            }
        }
    }

    /// The live executor, created with the default capacity if there is none
    /// or the current one was shut down.
    pub fn get_executor(&self) -> Result<Arc<dyn Executor>, ConfigurationError> {
        let (executor, replaced) = {
            let mut slot = self.lock_slot();
            match slot.as_ref() {
                Some(executor) if !executor.is_shutdown() => (executor.clone(), None),
                _ => self.configure_locked(&mut slot, None)?,
            }
        };
        drain(replaced);
        Ok(executor)
    }

    /// The current executor without creating one.
    pub fn current(&self) -> Option<Arc<dyn Executor>> {
        self.lock_slot().clone()
    }

    /// Capacity of the live executor, if there is one.
    pub fn max_workers(&self) -> Option<usize> {
        self.lock_slot()
            .as_ref()
            .filter(|executor| !executor.is_shutdown())
            .map(|executor| executor.max_workers())
    }

    /// True if an executor was created and has since been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.lock_slot()
            .as_ref()
            .is_some_and(|executor| executor.is_shutdown())
    }

    /// Returns the live executor and the instance it replaced, if any. The
    /// replaced instance is closed but still has to be drained by the caller
    /// once the slot is unlocked.
    fn configure_locked(
        &self,
        slot: &mut Slot,
        max_workers: Option<usize>,
    ) -> Result<(Arc<dyn Executor>, Option<Arc<dyn Executor>>), ConfigurationError> {
        let capacity = self.config.resolve_max_workers(max_workers);
        if let Some(existing) = slot.as_ref() {
            if !existing.is_shutdown() && existing.max_workers() == capacity {
                debug!(executor_id = %existing.id(), capacity, "executor already configured");
                return Ok((existing.clone(), None));
            }
        }

        let replacement = create_executor(&self.config, capacity)?;
        let replaced = slot.take().filter(|previous| previous.close());
        if let Some(previous) = &replaced {
            log_executor!(
                self.kind(),
                "replaced",
                executor_id = %previous.id(),
                old_capacity = previous.max_workers(),
                new_capacity = capacity
            );
        }
        log_executor!(self.kind(), "created", executor_id = %replacement.id(), capacity);
        *slot = Some(replacement.clone());
        Ok((replacement, replaced))
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn drain(replaced: Option<Arc<dyn Executor>>) {
    if let Some(previous) = replaced {
        previous.join();
        debug!(executor_id = %previous.id(), "replaced executor drained");
    }
}

/// Build a fresh executor of the configured kind.
pub fn create_executor(
    config: &ExecutorConfig,
    max_workers: usize,
) -> Result<Arc<dyn Executor>, ConfigurationError> {
    let prefix = config.thread_name_prefix.clone();
    let executor: Arc<dyn Executor> = match config.kind {
        ExecutorKind::ThreadPool => Arc::new(ThreadPoolExecutor::new(max_workers, prefix)?),
        ExecutorKind::BlockingPool => Arc::new(BlockingPoolExecutor::new(max_workers, prefix)?),
    };
    Ok(executor)
}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("kind", &self.config.kind)
            .field("executor", &self.current())
            .finish()
    }
}
