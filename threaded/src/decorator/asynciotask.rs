use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use threaded_api::{AsyncFn, CallWrapper, Decorator, ThreadedError};

use crate::decorator::LoopGetter;
use crate::log_decorator;

/// Schedules an async target as a task on a runtime.
///
/// The target's future is not bridged or awaited here; it is handed to the
/// resolved runtime as-is. By default the runtime of the caller is used.
pub struct AsyncIoTask<A> {
    loop_getter: LoopGetter<A>,
}

impl<A> AsyncIoTask<A>
where
    A: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            loop_getter: LoopGetter::Current,
        }
    }

    pub fn with_loop_strategy(mut self, loop_getter: LoopGetter<A>) -> Self {
        self.loop_getter = loop_getter;
        self
    }

    pub fn with_loop(self, runtime: Handle) -> Self {
        self.with_loop_strategy(LoopGetter::fixed(runtime))
    }

    pub fn with_loop_getter<G>(self, getter: G) -> Self
    where
        G: Fn() -> Option<Handle> + Send + Sync + 'static,
    {
        self.with_loop_strategy(LoopGetter::getter(getter))
    }

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

    /// Resolve the runtime a call with `args` would be scheduled on.
    pub fn get_loop(&self, args: &A) -> Option<Handle> {
        self.loop_getter.resolve(args)
    }

    pub fn decorate<R, F, Fut>(&self, func: F) -> TaskFn<A, R>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let func: AsyncFn<A, R> = Arc::new(move |args| func(args).boxed());
        self.get_function_wrapper(func)
    }
}

impl<A> Default for AsyncIoTask<A>
where
    A: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> Decorator<AsyncFn<A, R>> for AsyncIoTask<A>
where
    A: Send + 'static,
    R: Send + 'static,
{
    type Wrapper = TaskFn<A, R>;

    fn get_function_wrapper(&self, func: AsyncFn<A, R>) -> TaskFn<A, R> {
        TaskFn {
            func,
            loop_getter: self.loop_getter.clone(),
        }
    }
}

impl<A> Clone for AsyncIoTask<A> {
    fn clone(&self) -> Self {
        Self {
            loop_getter: self.loop_getter.clone(),
        }
    }
}

impl<A> fmt::Debug for AsyncIoTask<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncIoTask")
            .field("loop_getter", &self.loop_getter)
            .field("loop_getter_need_context", &self.loop_getter.needs_context())
            .finish()
    }
}

/// An async function bound to an `AsyncIoTask` decorator.
pub struct TaskFn<A, R> {
    func: AsyncFn<A, R>,
    loop_getter: LoopGetter<A>,
}

impl<A, R> CallWrapper<A> for TaskFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    type Output = Result<JoinHandle<R>, ThreadedError>;

    /// Fails with `ThreadedError::NoEventLoop` when no runtime resolves.
    fn call(&self, args: A) -> Self::Output {
        let runtime = self.loop_getter.resolve(&args).ok_or(ThreadedError::NoEventLoop)?;
        log_decorator!("asynciotask", "spawn");
        Ok(runtime.spawn((self.func)(args)))
    }
}

impl<A, R> Clone for TaskFn<A, R> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            loop_getter: self.loop_getter.clone(),
        }
    }
}

impl<A, R> fmt::Debug for TaskFn<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFn")
            .field("loop_getter", &self.loop_getter)
            .finish()
    }
}

/// Bare decoration: schedule on the caller's current runtime.
pub fn asynciotask<A, R, F, Fut>(func: F) -> TaskFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    AsyncIoTask::new().decorate(func)
}
