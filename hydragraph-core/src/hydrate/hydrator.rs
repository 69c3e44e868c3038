//! Hydrator functions.
//!
//! A hydrator derives a node's value from the resolved values of its
//! dependencies, passed positionally in declaration order. It may answer
//! immediately or hand back a future; the scheduler treats both the same way.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::graph::HydrationError;

/// Outcome of a single hydration attempt.
pub type HydrationResult = Result<Value, HydrationError>;

/// What a hydrator returns when invoked.
pub enum Hydration {
    /// The value (or failure) is available now.
    Ready(HydrationResult),

    /// The value will be produced by a future.
    Pending(BoxFuture<'static, HydrationResult>),
}

impl Hydration {
    /// A successful, synchronous result.
    pub fn ready(value: impl Into<Value>) -> Self {
        Self::Ready(Ok(value.into()))
    }

    /// A synchronous failure.
    pub fn failed(error: impl Into<HydrationError>) -> Self {
        Self::Ready(Err(error.into()))
    }

    /// A result that arrives later.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = HydrationResult> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }
}

impl From<HydrationResult> for Hydration {
    fn from(result: HydrationResult) -> Self {
        Self::Ready(result)
    }
}

impl fmt::Debug for Hydration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// A shareable hydrator function.
#[derive(Clone)]
pub struct Hydrator(Arc<dyn Fn(&[Value]) -> Hydration + Send + Sync>);

impl Hydrator {
    /// Wraps a function that decides per call whether to answer now or later.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Hydration + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wraps a synchronous derivation.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> HydrationResult + Send + Sync + 'static,
    {
        Self::new(move |deps| Hydration::Ready(f(deps)))
    }

    /// Wraps an asynchronous derivation. The future receives owned copies of
    /// the dependency values.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HydrationResult> + Send + 'static,
    {
        Self::new(move |deps| Hydration::pending(f(deps.to_vec())))
    }

    pub(crate) fn call(&self, deps: &[Value]) -> Hydration {
        (self.0)(deps)
    }
}

impl fmt::Debug for Hydrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hydrator(..)")
    }
}
