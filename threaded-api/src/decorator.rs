//! # Decorator Protocol
//!
//! A decorator turns a plain function into a wrapper with the same call
//! signature whose body runs the function on some execution target and
//! returns a handle to the eventual result.
//!
//! There are two ways to obtain a wrapper, and they produce the same type:
//!
//! - bare: a free function such as `threaded::threadpooled(func)`
//! - configured: build the decorator, then `decorate(func)` with it
//!
//! Targets take a single argument value; several arguments travel as a tuple
//! and no arguments as `()`.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::task::TaskResult;

/// A synchronous target, already bridged so it can run on any worker.
pub type PreparedFn<A, R> = Arc<dyn Fn(A) -> TaskResult<R> + Send + Sync>;

/// A target that produces a future when called.
pub type AsyncFn<A, R> = Arc<dyn Fn(A) -> BoxFuture<'static, R> + Send + Sync>;

/// Builds the wrapper for a target function.
///
/// Implementations decide the execution strategy. Binding is final: a wrapper
/// always calls the function it was built for.
pub trait Decorator<F> {
    type Wrapper;

    fn get_function_wrapper(&self, func: F) -> Self::Wrapper;
}

/// A decorated function.
pub trait CallWrapper<A>: Send + Sync {
    /// Pending result, task handle or thread, depending on the decorator.
    type Output;

    fn call(&self, args: A) -> Self::Output;

    /// Convert into a plain closure with the wrapper's call signature.
    fn into_fn(self) -> impl Fn(A) -> Self::Output + Send + Sync
    where
        Self: Sized,
    {
        move |args| self.call(args)
    }
}
