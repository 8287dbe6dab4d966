use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};
use uuid::Uuid;

use threaded_api::errors::panic_message;
use threaded_api::{ConfigurationError, Executor, ExecutorKind, Job, PoolError};

use crate::{executor_span, log_error};

/// Pool of named OS threads pulling jobs from a shared channel.
///
/// Workers are started lazily: a submission claims an idle worker if there is
/// one, and otherwise spawns a new worker while the pool is below
/// `max_workers`. A worker becomes idle again after finishing a job.
///
/// # Shutdown
/// `shutdown` closes the channel, lets the workers drain what is already
/// queued and joins them. It blocks the caller until that is done, except for
/// the calling thread itself when shutdown is requested from inside a job.
pub struct ThreadPoolExecutor {
    id: Uuid,
    max_workers: usize,
    name_prefix: String,

    /// Dropped on shutdown so workers exit once the queue is empty.
    sender: Mutex<Option<flume::Sender<Job>>>,
    receiver: flume::Receiver<Job>,

    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Workers waiting for a job that no submission has claimed yet.
    idle_workers: Arc<AtomicUsize>,
    is_shutdown: AtomicBool,
}

impl ThreadPoolExecutor {
    pub fn new(max_workers: usize, name_prefix: impl Into<String>) -> Result<Self, ConfigurationError> {
        if max_workers == 0 {
            return Err(ConfigurationError::InvalidCapacity(max_workers));
        }
        let (sender, receiver) = flume::unbounded();
        let executor = Self {
            id: Uuid::new_v4(),
            max_workers,
            name_prefix: name_prefix.into(),
            sender: Mutex::new(Some(sender)),
            receiver,
            workers: Mutex::new(Vec::new()),
            idle_workers: Arc::new(AtomicUsize::new(0)),
            is_shutdown: AtomicBool::new(false),
        };
        debug!(executor_id = %executor.id, max_workers, "thread pool created");
        Ok(executor)
    }

    /// Number of worker threads started so far.
    pub fn worker_count(&self) -> usize {
        lock(&self.workers).len()
    }

    /// Number of jobs waiting for a worker.
    pub fn queued_jobs(&self) -> usize {
        self.receiver.len()
    }

    fn ensure_worker(&self) -> Result<(), PoolError> {
        if self.claim_idle_worker() {
            return Ok(());
        }
        let mut workers = lock(&self.workers);
        if workers.len() >= self.max_workers {
            return Ok(());
        }
        let index = workers.len();
        match self.spawn_worker(index) {
            Ok(handle) => {
                workers.push(handle);
                Ok(())
            }
            // Jobs still get picked up by the workers already running.
            Err(err) if !workers.is_empty() => {
                warn!(executor_id = %self.id, error = %err, "failed to grow thread pool");
                Ok(())
            }
            Err(err) => Err(PoolError::WorkerSpawn(err.to_string())),
        }
    }

    fn claim_idle_worker(&self) -> bool {
        self.idle_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |idle| idle.checked_sub(1))
            .is_ok()
    }

    fn spawn_worker(&self, index: usize) -> io::Result<JoinHandle<()>> {
        let receiver = self.receiver.clone();
        let idle_workers = self.idle_workers.clone();
        let executor_id = self.id;
        thread::Builder::new()
            .name(format!("{}-{}", self.name_prefix, index))
            .spawn(move || worker_loop(executor_id, receiver, idle_workers))
    }
}

fn worker_loop(executor_id: Uuid, receiver: flume::Receiver<Job>, idle_workers: Arc<AtomicUsize>) {
    let span = executor_span!(ExecutorKind::ThreadPool, executor_id);
    let _guard = span.enter();
    trace!("worker started");
    while let Ok(job) = receiver.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            log_error!(panic_message(payload.as_ref()), "job panicked on worker");
        }
        idle_workers.fetch_add(1, Ordering::AcqRel);
    }
    trace!("worker exited");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Executor for ThreadPoolExecutor {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::ThreadPool
    }

    fn max_workers(&self) -> usize {
        self.max_workers
    }

    fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }

    fn execute(&self, job: Job) -> Result<(), PoolError> {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::Shutdown);
        };
        self.ensure_worker()?;
        sender.send(job).map_err(|_| PoolError::Shutdown)
    }

    fn close(&self) -> bool {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            return false;
        }
        lock(&self.sender).take();
        true
    }

    /// Joins every worker except the calling thread, so a job may close and
    /// join its own pool.
    fn join(&self) {
        if !self.is_shutdown() {
            return;
        }
        let workers = std::mem::take(&mut *lock(&self.workers));
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!(executor_id = %self.id, "worker thread terminated abnormally");
            }
        }
        debug!(executor_id = %self.id, "thread pool shut down");
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("id", &self.id)
            .field("max_workers", &self.max_workers)
            .field("workers", &self.worker_count())
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ThreadPoolExecutor::new(0, "test").unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidCapacity(0));
    }

    #[test]
    fn test_workers_start_lazily() {
        let pool = ThreadPoolExecutor::new(4, "lazy").unwrap();
        assert_eq!(pool.worker_count(), 0);

        let (tx, rx) = mpsc::channel();
        pool.execute(Box::new(move || tx.send(()).unwrap())).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(pool.worker_count(), 1);
        pool.shutdown();
    }

    #[test]
    fn test_worker_count_bounded_by_capacity() {
        let pool = ThreadPoolExecutor::new(2, "bounded").unwrap();
        let (release_tx, release_rx) = flume::unbounded::<()>();
        for _ in 0..6 {
            let release_rx = release_rx.clone();
            pool.execute(Box::new(move || {
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
            }))
            .unwrap();
        }
        assert!(pool.worker_count() <= 2);
        drop(release_tx);
        pool.shutdown();
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_huge_capacity_accepted() {
        let pool = ThreadPoolExecutor::new(usize::MAX, "huge").unwrap();
        assert_eq!(pool.max_workers(), usize::MAX);
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_idle_worker_claimed_once() {
        let pool = ThreadPoolExecutor::new(4, "claim").unwrap();
        let (tx, rx) = mpsc::channel();
        pool.execute(Box::new(move || tx.send(()).unwrap())).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        while pool.idle_workers.load(Ordering::Acquire) == 0 {
            thread::yield_now();
        }

        // One warm worker: two jobs that wait for each other need a second one.
        for _ in 0..10 {
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let (done_tx, done_rx) = mpsc::channel();
            for _ in 0..2 {
                let barrier = barrier.clone();
                let done_tx = done_tx.clone();
                pool.execute(Box::new(move || {
                    barrier.wait();
                    done_tx.send(()).unwrap();
                }))
                .unwrap();
            }
            for _ in 0..2 {
                done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            }
        }
        assert!(pool.worker_count() <= 4);
        pool.shutdown();
    }

    #[test]
    fn test_worker_survives_panicking_job() {
        let pool = ThreadPoolExecutor::new(1, "panic").unwrap();
        pool.execute(Box::new(|| panic!("boom"))).unwrap();

        let (tx, rx) = mpsc::channel();
        pool.execute(Box::new(move || tx.send(7).unwrap())).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        pool.shutdown();
    }
}
