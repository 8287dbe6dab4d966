//! # Pending Results
//!
//! `TaskFuture` is the handle returned for work submitted to an executor.
//! It can be awaited, waited on from a plain thread, polled without blocking
//! and cancelled while the job is still queued.
//!
//! The producing side holds a `TaskCompleter`, which executors move into the
//! job they run. Dropping a completer without completing it resolves the
//! future with `TaskError::Abandoned` (or `TaskError::Cancelled` if the job
//! was cancelled first).

use std::fmt;
use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::AtomicWaker;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::errors::{panic_message, TaskError};

/// Result type carried by a `TaskFuture`.
pub type TaskResult<R> = Result<R, TaskError>;

/// Lifecycle of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker.
    Pending = 0,
    /// A worker is executing the target.
    Running = 1,
    /// A result (value or error) has been produced.
    Finished = 2,
    /// Cancelled before a worker picked it up.
    Cancelled = 3,
}

impl TaskStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Running,
            2 => TaskStatus::Finished,
            _ => TaskStatus::Cancelled,
        }
    }
}

#[derive(Debug)]
struct TaskState {
    status: AtomicU8,
    /// Woken on cancellation, which can happen while the job is still queued.
    waker: AtomicWaker,
}

impl TaskState {
    fn new(status: TaskStatus) -> Self {
        Self {
            status: AtomicU8::new(status as u8),
            waker: AtomicWaker::new(),
        }
    }

    fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn transition(&self, from: TaskStatus, to: TaskStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set(&self, status: TaskStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    fn cancel(&self) -> bool {
        if self.transition(TaskStatus::Pending, TaskStatus::Cancelled) {
            self.waker.wake();
            return true;
        }
        self.status() == TaskStatus::Cancelled
    }

    fn lost_error(&self) -> TaskError {
        match self.status() {
            TaskStatus::Cancelled => TaskError::Cancelled,
            _ => TaskError::Abandoned,
        }
    }
}

enum Outcome<R> {
    Waiting(oneshot::Receiver<TaskResult<R>>),
    Failed(TaskError),
    Taken,
}

/// Handle to the eventual result of a submitted job.
pub struct TaskFuture<R> {
    state: Arc<TaskState>,
    outcome: Outcome<R>,
}

// The receiver is polled through `Pin::new`, nothing is structurally pinned.
impl<R> Unpin for TaskFuture<R> {}

impl<R> TaskFuture<R> {
    /// Create a connected completer/future pair.
    pub fn channel() -> (TaskCompleter<R>, TaskFuture<R>) {
        let state = Arc::new(TaskState::new(TaskStatus::Pending));
        let (sender, receiver) = oneshot::channel();
        let completer = TaskCompleter {
            state: state.clone(),
            sender,
        };
        let future = TaskFuture {
            state,
            outcome: Outcome::Waiting(receiver),
        };
        (completer, future)
    }

    /// A future that is already resolved with `error`.
    pub fn failed(error: TaskError) -> Self {
        Self {
            state: Arc::new(TaskState::new(TaskStatus::Finished)),
            outcome: Outcome::Failed(error),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    /// True once the job produced a result or was cancelled.
    pub fn is_done(&self) -> bool {
        matches!(self.status(), TaskStatus::Finished | TaskStatus::Cancelled)
    }

    pub fn is_running(&self) -> bool {
        self.status() == TaskStatus::Running
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::Cancelled
    }

    /// Cancel the job if no worker has picked it up yet.
    ///
    /// Returns `true` if the job is (now) cancelled. Work that already started
    /// is never interrupted.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    /// A detached handle that can cancel this job after the future was moved.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            state: self.state.clone(),
        }
    }

    /// Block the current thread until the result is available.
    ///
    /// A job cancelled by another thread while this call is already blocked
    /// is reported once a worker discards it from the queue. If `try_result`
    /// already handed out the result, this returns `TaskError::Join`.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context,
    /// where the future should be awaited instead.
    pub fn wait(self) -> TaskResult<R> {
        let state = self.state;
        match self.outcome {
            Outcome::Waiting(_) if state.status() == TaskStatus::Cancelled => Err(TaskError::Cancelled),
            Outcome::Waiting(receiver) => receiver
                .blocking_recv()
                .unwrap_or_else(|_| Err(state.lost_error())),
            Outcome::Failed(error) => Err(error),
            Outcome::Taken => Err(TaskError::Join("result already taken".to_string())),
        }
    }

    /// Take the result if it is ready, without blocking.
    ///
    /// Returns `None` while the job is still pending or running, and after the
    /// result has been taken once.
    pub fn try_result(&mut self) -> Option<TaskResult<R>> {
        if self.is_cancelled() && matches!(self.outcome, Outcome::Waiting(_)) {
            self.outcome = Outcome::Taken;
            return Some(Err(TaskError::Cancelled));
        }
        let received = match &mut self.outcome {
            Outcome::Waiting(receiver) => receiver.try_recv(),
            Outcome::Failed(_) => return Some(Err(self.take_failure())),
            Outcome::Taken => return None,
        };
        match received {
            Ok(result) => {
                self.outcome = Outcome::Taken;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.outcome = Outcome::Taken;
                Some(Err(self.state.lost_error()))
            }
        }
    }

    fn take_failure(&mut self) -> TaskError {
        match mem::replace(&mut self.outcome, Outcome::Taken) {
            Outcome::Failed(error) => error,
            _ => panic!("TaskFuture polled after completion"),
        }
    }
}

impl<R> Future for TaskFuture<R> {
    type Output = TaskResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if matches!(this.outcome, Outcome::Waiting(_)) {
            this.state.waker.register(cx.waker());
            if this.is_cancelled() {
                this.outcome = Outcome::Taken;
                return Poll::Ready(Err(TaskError::Cancelled));
            }
        }
        let polled = match &mut this.outcome {
            Outcome::Waiting(receiver) => Pin::new(receiver).poll(cx),
            Outcome::Failed(_) | Outcome::Taken => return Poll::Ready(Err(this.take_failure())),
        };
        match polled {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => {
                this.outcome = Outcome::Taken;
                Poll::Ready(result)
            }
            Poll::Ready(Err(_)) => {
                this.outcome = Outcome::Taken;
                Poll::Ready(Err(this.state.lost_error()))
            }
        }
    }
}

impl<R> fmt::Debug for TaskFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("status", &self.status())
            .finish()
    }
}

/// Producing half of a `TaskFuture`.
pub struct TaskCompleter<R> {
    state: Arc<TaskState>,
    sender: oneshot::Sender<TaskResult<R>>,
}

impl<R> TaskCompleter<R> {
    pub fn is_cancelled(&self) -> bool {
        self.state.status() == TaskStatus::Cancelled
    }

    /// Run `func` and publish its result.
    ///
    /// Does nothing if the job was cancelled while queued. A panic inside
    /// `func` is caught and published as `TaskError::Panicked`.
    pub fn run<F>(self, func: F)
    where
        F: FnOnce() -> TaskResult<R>,
    {
        if !self.state.transition(TaskStatus::Pending, TaskStatus::Running) {
            return;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(func))
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));
        self.complete(result);
    }

    /// Publish `result` directly.
    pub fn complete(self, result: TaskResult<R>) {
        self.state.set(TaskStatus::Finished);
        // The caller may have dropped its handle; nobody is left to notify.
        let _ = self.sender.send(result);
    }
}

impl<R> fmt::Debug for TaskCompleter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCompleter")
            .field("status", &self.state.status())
            .finish()
    }
}

/// Cancels a queued job independently of its `TaskFuture`.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<TaskState>,
}

impl CancelHandle {
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }
}
