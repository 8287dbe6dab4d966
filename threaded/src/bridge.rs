//! Running targets on synchronous workers.
//!
//! Pool workers and spawned threads have no ambient runtime. An async target
//! is driven to completion on a throwaway current-thread runtime created for
//! that one call, so synchronous callers never see an unresolved future.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Builder;
use tracing::trace;

use threaded_api::{PreparedFn, TaskError, TaskResult};

/// Wrap an async target into a synchronous one that blocks until the future
/// it returns has resolved.
///
/// Blocks the calling thread. Must not be invoked from inside an async task.
pub fn await_if_required<A, R, F, Fut>(target: F) -> impl Fn(A) -> TaskResult<R> + Send + Sync + 'static
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + 'static,
    A: 'static,
    R: 'static,
{
    move |args| block_on_fresh_runtime(target(args))
}

/// Drive `future` on a single-use runtime and discard the runtime afterwards.
pub fn block_on_fresh_runtime<Fut: Future>(future: Fut) -> TaskResult<Fut::Output> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TaskError::Bridge(e.to_string()))?;
    trace!("driving async target on a throwaway runtime");
    Ok(runtime.block_on(future))
}

/// Prepare a synchronous target for submission.
pub fn prepare<A, R, F>(func: F) -> PreparedFn<A, R>
where
    F: Fn(A) -> R + Send + Sync + 'static,
    A: 'static,
    R: 'static,
{
    Arc::new(move |args| Ok(func(args)))
}

/// Prepare an async target for submission to a synchronous worker.
pub fn prepare_async<A, R, F, Fut>(func: F) -> PreparedFn<A, R>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + 'static,
    A: 'static,
    R: 'static,
{
    Arc::new(await_if_required(func))
}
