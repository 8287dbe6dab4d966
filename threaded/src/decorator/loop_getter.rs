use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

/// How a decorated call picks the runtime ("event loop") it runs on.
///
/// Runtimes are never owned here: handles are borrowed from the caller's
/// environment on every call.
pub enum LoopGetter<A> {
    /// No runtime; pooled calls go straight to the executor.
    None,
    /// The runtime the caller is running in, if any.
    Current,
    /// Always this runtime.
    Fixed(Handle),
    /// Invoked on every call.
    Getter(Arc<dyn Fn() -> Option<Handle> + Send + Sync>),
    /// Invoked on every call with the call's arguments.
    WithContext(Arc<dyn Fn(&A) -> Option<Handle> + Send + Sync>),
}

impl<A> LoopGetter<A> {
    pub fn fixed(handle: Handle) -> Self {
        LoopGetter::Fixed(handle)
    }

    pub fn getter<G>(getter: G) -> Self
    where
        G: Fn() -> Option<Handle> + Send + Sync + 'static,
    {
        LoopGetter::Getter(Arc::new(getter))
    }

    pub fn with_context<G>(getter: G) -> Self
    where
        G: Fn(&A) -> Option<Handle> + Send + Sync + 'static,
    {
        LoopGetter::WithContext(Arc::new(getter))
    }

    /// Whether the getter needs the call's arguments.
    pub fn needs_context(&self) -> bool {
        matches!(self, LoopGetter::WithContext(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, LoopGetter::None)
    }

    /// Resolve the runtime for one call.
    pub fn resolve(&self, args: &A) -> Option<Handle> {
        match self {
            LoopGetter::None => None,
            LoopGetter::Current => Handle::try_current().ok(),
            LoopGetter::Fixed(handle) => Some(handle.clone()),
            LoopGetter::Getter(getter) => getter(),
            LoopGetter::WithContext(getter) => getter(args),
        }
    }
}

impl<A> Clone for LoopGetter<A> {
    fn clone(&self) -> Self {
        match self {
            LoopGetter::None => LoopGetter::None,
            LoopGetter::Current => LoopGetter::Current,
            LoopGetter::Fixed(handle) => LoopGetter::Fixed(handle.clone()),
            LoopGetter::Getter(getter) => LoopGetter::Getter(getter.clone()),
            LoopGetter::WithContext(getter) => LoopGetter::WithContext(getter.clone()),
        }
    }
}

impl<A> Default for LoopGetter<A> {
    fn default() -> Self {
        LoopGetter::None
    }
}

impl<A> fmt::Debug for LoopGetter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopGetter::None => f.write_str("None"),
            LoopGetter::Current => f.write_str("Current"),
            LoopGetter::Fixed(_) => f.write_str("Fixed(..)"),
            LoopGetter::Getter(_) => f.write_str("Getter(..)"),
            LoopGetter::WithContext(_) => f.write_str("WithContext(..)"),
        }
    }
}
