//! # Decorators
//!
//! Wrappers that change where a function runs:
//!
//! - [`Pooled`] (with the [`ThreadPooled`] and [`BlockingPooled`] flavours)
//!   submits calls to a shared executor and optionally hands the result to a
//!   runtime resolved by a [`LoopGetter`].
//! - [`Threaded`] runs each call on its own new thread.
//! - [`AsyncIoTask`] spawns async targets on a runtime.
//!
//! Every decorator accepts a target either bare (free functions such as
//! [`threadpooled`]) or after configuration (builder methods followed by
//! `decorate`).

mod asynciotask;
mod loop_getter;
mod pooled;
mod threaded;

pub use asynciotask::{asynciotask, AsyncIoTask, TaskFn};
pub use loop_getter::LoopGetter;
pub use pooled::{
    blockingpooled, threadpooled, threadpooled_async, BlockingPooled, Pooled, PooledCall, PooledFn,
    ThreadPooled,
};
pub use threaded::{function_name, threaded, threaded_async, SpawnedThread, Threaded, ThreadedFn};
