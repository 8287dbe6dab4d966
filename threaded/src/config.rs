use threaded_api::ExecutorKind;

/// Default number of pool workers per detected CPU core.
pub const DEFAULT_WORKER_MULTIPLIER: usize = 5;

/// Prefix of thread names derived from the target function.
pub const THREADED_NAME_PREFIX: &str = "Threaded: ";

/// Detected CPU core count, never less than one.
pub fn cpu_count() -> usize {
    num_cpus::get().max(1)
}

/// Capacity used when an executor is configured without an explicit size.
pub fn default_max_workers() -> usize {
    cpu_count() * DEFAULT_WORKER_MULTIPLIER
}

// --- Executor Configuration ---

/// Configuration of the executors created by an `ExecutorHandle`.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Which primitive backs the executor.
    pub kind: ExecutorKind,

    /// Capacity used by `configure(None)`. Derived from the core count if unset.
    pub max_workers: Option<usize>,

    /// Workers per CPU core when `max_workers` is unset.
    pub worker_multiplier: usize,

    /// Prefix of worker thread names.
    pub thread_name_prefix: String,
}

impl ExecutorConfig {
    pub fn new(kind: ExecutorKind) -> Self {
        let thread_name_prefix = match kind {
            ExecutorKind::ThreadPool => "threadpooled-worker",
            ExecutorKind::BlockingPool => "blockingpooled-worker",
        };
        Self {
            kind,
            max_workers: None,
            worker_multiplier: DEFAULT_WORKER_MULTIPLIER,
            thread_name_prefix: thread_name_prefix.to_string(),
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Capacity to use for a `configure(requested)` call.
    pub fn resolve_max_workers(&self, requested: Option<usize>) -> usize {
        requested
            .or(self.max_workers)
            .unwrap_or_else(|| cpu_count() * self.worker_multiplier)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(ExecutorKind::ThreadPool)
    }
}
