//! # Handler Chains
//!
//! Ordered composition of request handlers. Each handler receives the shared
//! [`Ctx`] and a [`Next`] continuation; calling `next.run(ctx)` hands control
//! to the rest of the chain. A handler that returns an error stops the chain
//! immediately and the error propagates to the boundary responder.
//!
//! `Next` enforces the at-most-once contract: invoking the same continuation
//! twice resolves to [`RequestError::DoubleContinuation`] instead of silently
//! re-running downstream handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::context::Ctx;
use crate::error::RequestError;

/// Boxed future returned by handlers
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A request handler participating in a chain
pub type Handler = Arc<dyn Fn(Ctx, Next) -> BoxFuture<Result<(), RequestError>> + Send + Sync>;

/// Wrap an async closure into a [`Handler`]
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Ctx, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RequestError>> + Send + 'static,
{
    Arc::new(move |ctx, next| Box::pin(f(ctx, next)))
}

/// Continuation handed to each handler
///
/// Invokable at most once per request.
pub struct Next {
    handlers: Arc<[Handler]>,
    index: usize,
    invoked: Arc<AtomicBool>,
}

impl Next {
    /// Invoke the remainder of the chain
    ///
    /// A second invocation of the same continuation fails with
    /// [`RequestError::DoubleContinuation`].
    pub fn run(&self, ctx: Ctx) -> BoxFuture<Result<(), RequestError>> {
        if self.invoked.swap(true, Ordering::SeqCst) {
            return Box::pin(async { Err(RequestError::DoubleContinuation) });
        }

        let Some(handler) = self.handlers.get(self.index).cloned() else {
            return Box::pin(async { Ok(()) });
        };
        let next = Self {
            handlers: Arc::clone(&self.handlers),
            index: self.index + 1,
            invoked: Arc::new(AtomicBool::new(false)),
        };
        handler(ctx, next)
    }
}

/// An immutable, executable sequence of handlers
#[derive(Clone)]
pub struct Chain {
    handlers: Arc<[Handler]>,
}

impl Chain {
    /// Compose handlers front to back
    #[must_use]
    pub fn new(handlers: Vec<Handler>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    /// Execute the chain against a request context
    pub fn run(&self, ctx: Ctx) -> BoxFuture<Result<(), RequestError>> {
        let entry = Next {
            handlers: Arc::clone(&self.handlers),
            index: 0,
            invoked: Arc::new(AtomicBool::new(false)),
        };
        entry.run(ctx)
    }

    /// Number of handlers in the chain
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the chain has no handlers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}
