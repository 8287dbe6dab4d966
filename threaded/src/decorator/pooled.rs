use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

use threaded_api::errors::panic_message;
use threaded_api::{
    CallWrapper, CancelHandle, ConfigurationError, Decorator, Executor, ExecutorKind, PreparedFn,
    TaskError, TaskFuture, TaskResult,
};

use crate::bridge::{prepare, prepare_async};
use crate::decorator::LoopGetter;
use crate::executor::ExecutorHandle;
use crate::log_decorator;

/// Posts functions to a shared executor.
///
/// Without a loop strategy a call submits the target to the executor and
/// returns a [`TaskFuture`]. When a runtime is resolved for the call, the
/// submission is additionally awaited by a task spawned on that runtime and
/// the call returns the task's handle.
pub struct Pooled<A> {
    handle: Arc<ExecutorHandle>,
    loop_getter: LoopGetter<A>,
}

impl<A> Pooled<A>
where
    A: Send + 'static,
{
    /// Decorator submitting to the executor owned by `handle`.
    pub fn new(handle: Arc<ExecutorHandle>) -> Self {
        Self {
            handle,
            loop_getter: LoopGetter::None,
        }
    }

    pub fn with_loop_strategy(mut self, loop_getter: LoopGetter<A>) -> Self {
        self.loop_getter = loop_getter;
        self
    }

    /// Always hand results to `runtime`.
    pub fn with_loop(self, runtime: Handle) -> Self {
        self.with_loop_strategy(LoopGetter::fixed(runtime))
    }

    /// Resolve the runtime per call; `None` falls back to the bare future.
    pub fn with_loop_getter<G>(self, getter: G) -> Self
    where
        G: Fn() -> Option<Handle> + Send + Sync + 'static,
    {
        self.with_loop_strategy(LoopGetter::getter(getter))
    }

    /// Resolve the runtime per call from the call's arguments.
    pub fn with_context_loop_getter<G>(self, getter: G) -> Self
    where
        G: Fn(&A) -> Option<Handle> + Send + Sync + 'static,
    {
        self.with_loop_strategy(LoopGetter::with_context(getter))
    }

    pub fn loop_getter(&self) -> &LoopGetter<A> {
        &self.loop_getter
    }

    pub fn loop_getter_need_context(&self) -> bool {
        self.loop_getter.needs_context()
    }

    pub fn handle(&self) -> &Arc<ExecutorHandle> {
        &self.handle
    }

    pub fn executor(&self) -> Result<Arc<dyn Executor>, ConfigurationError> {
        self.handle.get_executor()
    }

    pub fn decorate<R, F>(&self, func: F) -> PooledFn<A, R>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        self.get_function_wrapper(prepare(func))
    }

    /// Decorate an async target; workers drive its future to completion.
    pub fn decorate_async<R, F, Fut>(&self, func: F) -> PooledFn<A, R>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + 'static,
        R: Send + 'static,
    {
        self.get_function_wrapper(prepare_async(func))
    }
}

impl<A, R> Decorator<PreparedFn<A, R>> for Pooled<A>
where
    A: Send + 'static,
    R: Send + 'static,
{
    type Wrapper = PooledFn<A, R>;

    fn get_function_wrapper(&self, func: PreparedFn<A, R>) -> PooledFn<A, R> {
        PooledFn {
            func,
            handle: self.handle.clone(),
            loop_getter: self.loop_getter.clone(),
        }
    }
}

impl<A> Clone for Pooled<A> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            loop_getter: self.loop_getter.clone(),
        }
    }
}

impl<A> fmt::Debug for Pooled<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("kind", &self.handle.kind())
            .field("loop_getter", &self.loop_getter)
            .field("loop_getter_need_context", &self.loop_getter.needs_context())
            .finish()
    }
}

/// A function bound to a pooled decorator.
pub struct PooledFn<A, R> {
    func: PreparedFn<A, R>,
    handle: Arc<ExecutorHandle>,
    loop_getter: LoopGetter<A>,
}

impl<A, R> PooledFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Submit straight to the executor, ignoring any loop strategy.
    ///
    /// A submission refused by the executor (for example because it was shut
    /// down between lookup and submission) resolves the future with
    /// `TaskError::Submit`; it is not retried.
    pub fn submit(&self, args: A) -> TaskFuture<R> {
        let func = self.func.clone();
        match self.handle.get_executor() {
            Ok(executor) => {
                log_decorator!("pooled", "submit", executor_id = %executor.id());
                executor.spawn(move || func(args))
            }
            Err(err) => TaskFuture::failed(TaskError::Configuration(err)),
        }
    }

    pub fn handle(&self) -> &Arc<ExecutorHandle> {
        &self.handle
    }
}

impl<A, R> CallWrapper<A> for PooledFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    type Output = PooledCall<R>;

    fn call(&self, args: A) -> PooledCall<R> {
        let runtime = self.loop_getter.resolve(&args);
        let future = self.submit(args);
        match runtime {
            None => PooledCall::Future(future),
            Some(runtime) => {
                let cancel = future.cancel_handle();
                PooledCall::Loop {
                    task: runtime.spawn(future),
                    cancel,
                }
            }
        }
    }
}

impl<A, R> Clone for PooledFn<A, R> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            handle: self.handle.clone(),
            loop_getter: self.loop_getter.clone(),
        }
    }
}

impl<A, R> fmt::Debug for PooledFn<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledFn")
            .field("kind", &self.handle.kind())
            .field("loop_getter", &self.loop_getter)
            .finish()
    }
}

/// Pending result of a pooled call.
pub enum PooledCall<R> {
    /// Submitted to the executor; no runtime involved.
    Future(TaskFuture<R>),
    /// Submitted to the executor and awaited by a task on the resolved runtime.
    Loop {
        task: JoinHandle<TaskResult<R>>,
        cancel: CancelHandle,
    },
}

impl<R> Unpin for PooledCall<R> {}

impl<R> PooledCall<R> {
    pub fn is_loop_task(&self) -> bool {
        matches!(self, PooledCall::Loop { .. })
    }

    /// Cancel the pooled job if no worker has picked it up yet.
    pub fn cancel(&self) -> bool {
        match self {
            PooledCall::Future(future) => future.cancel(),
            PooledCall::Loop { cancel, .. } => cancel.cancel(),
        }
    }

    pub fn is_done(&self) -> bool {
        match self {
            PooledCall::Future(future) => future.is_done(),
            PooledCall::Loop { task, .. } => task.is_finished(),
        }
    }

    pub fn into_task_future(self) -> Option<TaskFuture<R>> {
        match self {
            PooledCall::Future(future) => Some(future),
            PooledCall::Loop { .. } => None,
        }
    }

    /// Block the current thread until the result is available.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context.
    pub fn wait(self) -> TaskResult<R> {
        match self {
            PooledCall::Future(future) => future.wait(),
            PooledCall::Loop { task, .. } => futures::executor::block_on(task).unwrap_or_else(|e| Err(join_error(e))),
        }
    }
}

impl<R> Future for PooledCall<R> {
    type Output = TaskResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            PooledCall::Future(future) => Pin::new(future).poll(cx),
            PooledCall::Loop { task, .. } => Pin::new(task)
                .poll(cx)
                .map(|joined| joined.unwrap_or_else(|e| Err(join_error(e)))),
        }
    }
}

impl<R> fmt::Debug for PooledCall<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PooledCall::Future(future) => f.debug_tuple("Future").field(future).finish(),
            PooledCall::Loop { cancel, .. } => f.debug_struct("Loop").field("status", &cancel.status()).finish(),
        }
    }
}

fn join_error(error: JoinError) -> TaskError {
    if error.is_cancelled() {
        TaskError::Cancelled
    } else if error.is_panic() {
        TaskError::Panicked(panic_message(error.into_panic().as_ref()))
    } else {
        TaskError::Join(error.to_string())
    }
}

// --- Named pooled flavours ---

/// Pooled decorator on the process-wide thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPooled;

impl ThreadPooled {
    pub fn new<A: Send + 'static>() -> Pooled<A> {
        Pooled::new(Self::handle())
    }

    pub fn handle() -> Arc<ExecutorHandle> {
        ExecutorHandle::global(ExecutorKind::ThreadPool)
    }

    pub fn configure(max_workers: Option<usize>) -> Result<(), ConfigurationError> {
        Self::handle().configure(max_workers)
    }

    pub fn shutdown() {
        Self::handle().shutdown()
    }

    pub fn executor() -> Result<Arc<dyn Executor>, ConfigurationError> {
        Self::handle().get_executor()
    }
}

/// Pooled decorator on the process-wide blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingPooled;

impl BlockingPooled {
    pub fn new<A: Send + 'static>() -> Pooled<A> {
        Pooled::new(Self::handle())
    }

    pub fn handle() -> Arc<ExecutorHandle> {
        ExecutorHandle::global(ExecutorKind::BlockingPool)
    }

    pub fn configure(max_workers: Option<usize>) -> Result<(), ConfigurationError> {
        Self::handle().configure(max_workers)
    }

    pub fn shutdown() {
        Self::handle().shutdown()
    }

    pub fn executor() -> Result<Arc<dyn Executor>, ConfigurationError> {
        Self::handle().get_executor()
    }
}

/// Bare decoration on the shared thread pool.
pub fn threadpooled<A, R, F>(func: F) -> PooledFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    ThreadPooled::new().decorate(func)
}

/// Bare decoration of an async target on the shared thread pool.
pub fn threadpooled_async<A, R, F, Fut>(func: F) -> PooledFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + 'static,
{
    ThreadPooled::new().decorate_async(func)
}

/// Bare decoration on the shared blocking pool.
pub fn blockingpooled<A, R, F>(func: F) -> PooledFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    BlockingPooled::new().decorate(func)
}
