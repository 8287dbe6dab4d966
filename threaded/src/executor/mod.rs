//! # Executors
//!
//! Pool primitives and the handle that owns the shared instance.
//!
//! ## Key Concepts
//! - `ThreadPoolExecutor`: OS worker threads, graceful draining shutdown
//! - `BlockingPoolExecutor`: runtime blocking pool, abrupt shutdown
//! - `ExecutorHandle`: lazily created, reconfigurable slot shared by call sites

mod blocking;
mod handle;
mod thread_pool;

pub use blocking::BlockingPoolExecutor;
pub use handle::{create_executor, ExecutorHandle};
pub use thread_pool::ThreadPoolExecutor;
