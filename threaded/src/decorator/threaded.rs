use std::any;
use std::fmt;
use std::future::Future;
use std::mem;
use std::thread::{self, JoinHandle};

use tracing::warn;

use threaded_api::errors::panic_message;
use threaded_api::{CallWrapper, Decorator, PreparedFn, TaskError, TaskResult, ThreadedError};

use crate::bridge::{prepare, prepare_async};
use crate::config::THREADED_NAME_PREFIX;
use crate::log_decorator;

/// Runs every call on a dedicated, freshly created thread.
///
/// No pooling and no capacity limit. The thread is named after the target
/// (`"Threaded: <function>"`) unless a name is configured, and is returned
/// unstarted unless `started(true)` was set.
#[derive(Debug, Clone, Default)]
pub struct Threaded {
    name: Option<String>,
    daemon: bool,
    started: bool,
}

impl Threaded {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Daemon threads are detached when their handle is dropped; others are joined.
    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    /// Start the thread before handing it back.
    pub fn started(mut self, started: bool) -> Self {
        self.started = started;
        self
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn decorate<A, R, F>(&self, func: F) -> ThreadedFn<A, R>
    where
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let name = self.resolve_name::<F>();
        self.bind(name, prepare(func))
    }

    /// Decorate an async target; the spawned thread drives it to completion.
    pub fn decorate_async<A, R, F, Fut>(&self, func: F) -> ThreadedFn<A, R>
    where
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + 'static,
    {
        let name = self.resolve_name::<F>();
        self.bind(name, prepare_async(func))
    }

    fn resolve_name<F>(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}{}", THREADED_NAME_PREFIX, function_name::<F>()))
    }

    fn bind<A, R>(&self, name: String, func: PreparedFn<A, R>) -> ThreadedFn<A, R> {
        ThreadedFn {
            func,
            name,
            daemon: self.daemon,
            started: self.started,
        }
    }
}

impl<A, R> Decorator<PreparedFn<A, R>> for Threaded
where
    A: Send + 'static,
    R: Send + 'static,
{
    type Wrapper = ThreadedFn<A, R>;

    /// Prepared functions carry no identifier; without a configured name the
    /// thread is called `"Threaded: anonymous"`.
    fn get_function_wrapper(&self, func: PreparedFn<A, R>) -> ThreadedFn<A, R> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{}anonymous", THREADED_NAME_PREFIX));
        self.bind(name, func)
    }
}

/// Short name of a function item's type, e.g. `"compute"` for `my_crate::compute`.
///
/// Closures are named after their enclosing function (`"main::{{closure}}"`).
/// Based on `std::any::type_name`, whose exact output is best effort.
pub fn function_name<F>() -> String {
    let full = any::type_name::<F>();
    let path = full.split('<').next().unwrap_or(full);
    let segments: Vec<&str> = path.split("::").collect();
    match segments.as_slice() {
        [.., parent, last] if last.starts_with("{{closure}}") => format!("{}::{}", parent, last),
        [.., last] => (*last).to_string(),
        [] => full.to_string(),
    }
}

/// A function bound to a `Threaded` decorator.
pub struct ThreadedFn<A, R> {
    func: PreparedFn<A, R>,
    name: String,
    daemon: bool,
    started: bool,
}

impl<A, R> ThreadedFn<A, R> {
    /// Name given to every thread this wrapper creates.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<A, R> CallWrapper<A> for ThreadedFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    type Output = Result<SpawnedThread<R>, ThreadedError>;

    fn call(&self, args: A) -> Self::Output {
        let func = self.func.clone();
        let mut thread = SpawnedThread::new(self.name.clone(), self.daemon, Box::new(move || func(args)));
        if self.started {
            thread.start()?;
        }
        Ok(thread)
    }
}

impl<A, R> Clone for ThreadedFn<A, R> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            name: self.name.clone(),
            daemon: self.daemon,
            started: self.started,
        }
    }
}

impl<A, R> fmt::Debug for ThreadedFn<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedFn")
            .field("name", &self.name)
            .field("daemon", &self.daemon)
            .field("started", &self.started)
            .finish()
    }
}

type ThreadBody<R> = Box<dyn FnOnce() -> TaskResult<R> + Send + 'static>;

enum ThreadState<R> {
    Created(ThreadBody<R>),
    Running(JoinHandle<TaskResult<R>>),
    Joined,
}

/// A dedicated thread created by a `Threaded` call, started or not.
///
/// Dropping the handle of a started non-daemon thread joins it; a daemon
/// thread is detached instead.
pub struct SpawnedThread<R> {
    name: String,
    daemon: bool,
    state: ThreadState<R>,
}

impl<R: Send + 'static> SpawnedThread<R> {
    fn new(name: String, daemon: bool, body: ThreadBody<R>) -> Self {
        Self {
            name,
            daemon,
            state: ThreadState::Created(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.state, ThreadState::Created(_))
    }

    /// True while the started thread has not finished.
    pub fn is_alive(&self) -> bool {
        match &self.state {
            ThreadState::Running(handle) => !handle.is_finished(),
            _ => false,
        }
    }

    /// Start the thread. A thread can be started at most once.
    pub fn start(&mut self) -> Result<(), ThreadedError> {
        let body = match mem::replace(&mut self.state, ThreadState::Joined) {
            ThreadState::Created(body) => body,
            other => {
                self.state = other;
                return Err(ThreadedError::AlreadyStarted(self.name.clone()));
            }
        };
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(body)
            .map_err(|e| ThreadedError::ThreadSpawn {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        log_decorator!("threaded", "started", thread = %self.name, daemon = self.daemon);
        self.state = ThreadState::Running(handle);
        Ok(())
    }

    /// Wait for the thread to finish and take the target's result.
    pub fn join(mut self) -> Result<R, ThreadedError> {
        match mem::replace(&mut self.state, ThreadState::Joined) {
            ThreadState::Running(handle) => {
                let result = handle
                    .join()
                    .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));
                Ok(result?)
            }
            _ => Err(ThreadedError::NotStarted(self.name.clone())),
        }
    }
}

impl<R> Drop for SpawnedThread<R> {
    fn drop(&mut self) {
        let ThreadState::Running(handle) = mem::replace(&mut self.state, ThreadState::Joined) else {
            return;
        };
        if self.daemon || handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!(thread = %self.name, "threaded target panicked");
        }
    }
}

impl<R> fmt::Debug for SpawnedThread<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            ThreadState::Created(_) => "created",
            ThreadState::Running(handle) if handle.is_finished() => "finished",
            ThreadState::Running(_) => "running",
            ThreadState::Joined => "joined",
        };
        f.debug_struct("SpawnedThread")
            .field("name", &self.name)
            .field("daemon", &self.daemon)
            .field("state", &state)
            .finish()
    }
}

/// Bare decoration: one new, unstarted thread per call.
pub fn threaded<A, R, F>(func: F) -> ThreadedFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    Threaded::new().decorate(func)
}

/// Bare decoration of an async target: one new, unstarted thread per call.
pub fn threaded_async<A, R, F, Fut>(func: F) -> ThreadedFn<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + 'static,
{
    Threaded::new().decorate_async(func)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute(_: ()) -> u8 {
        1
    }

    #[test]
    fn test_function_name_of_fn_item() {
        fn name_of<F>(_: &F) -> String {
            function_name::<F>()
        }
        assert_eq!(name_of(&compute), "compute");
    }

    #[test]
    fn test_function_name_of_closure() {
        fn name_of<F>(_: &F) -> String {
            function_name::<F>()
        }
        let closure = |_: ()| 2u8;
        assert!(name_of(&closure).ends_with("{{closure}}"));
    }
}
