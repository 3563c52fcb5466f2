//! References to handlers and to named sets.

use std::fmt;
use std::sync::Arc;

use crate::error_handler::DefaultErrorHandler;
use crate::handler::{
    AsyncFnErrorHandler, AsyncFnMiddleware, BoxedErrorHandler, BoxedMiddleware, ErrorHandler,
    FnErrorHandler, FnMiddleware, Middleware,
};

/// One entry of a set, or the argument to a pipeline builder.
///
/// `H` is the stored handler type: [`BoxedMiddleware`] for main-chain sets,
/// [`BoxedErrorHandler`] for error sets.
///
/// ```rust
/// use tsu_sets::{HandlerRef, MiddlewareRef, from_fn};
///
/// let items: Vec<MiddlewareRef> = vec![
///     "base".into(),
///     from_fn(|_req, _res| {}).into(),
/// ];
/// let set = HandlerRef::from(items);
/// assert!(matches!(set, HandlerRef::List(ref items) if items.len() == 2));
/// ```
pub enum HandlerRef<H> {
    /// The name of a registered set.
    Name(String),
    Handler(H),
    /// An ordered mix of names, handlers and nested lists.
    List(Vec<HandlerRef<H>>),
}

/// A reference into the main-chain table.
pub type MiddlewareRef = HandlerRef<BoxedMiddleware>;

/// A reference into the error-handler table.
pub type ErrorHandlerRef = HandlerRef<BoxedErrorHandler>;

impl<H> HandlerRef<H> {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Normalizes into the list form a set is stored as.
    pub(crate) fn into_list(self) -> Vec<HandlerRef<H>> {
        match self {
            Self::List(items) => items,
            other => vec![other],
        }
    }
}

impl MiddlewareRef {
    pub fn handler(handler: impl Middleware) -> Self {
        Self::Handler(Arc::new(handler))
    }
}

impl ErrorHandlerRef {
    pub fn error_handler(handler: impl ErrorHandler) -> Self {
        Self::Handler(Arc::new(handler))
    }
}

impl<H: Clone> Clone for HandlerRef<H> {
    fn clone(&self) -> Self {
        match self {
            Self::Name(name) => Self::Name(name.clone()),
            Self::Handler(h) => Self::Handler(h.clone()),
            Self::List(items) => Self::List(items.clone()),
        }
    }
}

impl<H> fmt::Debug for HandlerRef<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name:?}"),
            Self::Handler(_) => f.write_str("<handler>"),
            Self::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl<H> From<&str> for HandlerRef<H> {
    fn from(name: &str) -> Self { Self::Name(name.to_owned()) }
}

impl<H> From<String> for HandlerRef<H> {
    fn from(name: String) -> Self { Self::Name(name) }
}

impl<H> From<Vec<HandlerRef<H>>> for HandlerRef<H> {
    fn from(items: Vec<HandlerRef<H>>) -> Self { Self::List(items) }
}

impl From<BoxedMiddleware> for MiddlewareRef {
    fn from(handler: BoxedMiddleware) -> Self { Self::Handler(handler) }
}

impl From<BoxedErrorHandler> for ErrorHandlerRef {
    fn from(handler: BoxedErrorHandler) -> Self { Self::Handler(handler) }
}

impl<F> From<FnMiddleware<F>> for MiddlewareRef
where
    FnMiddleware<F>: Middleware,
{
    fn from(handler: FnMiddleware<F>) -> Self { Self::handler(handler) }
}

impl<F> From<AsyncFnMiddleware<F>> for MiddlewareRef
where
    AsyncFnMiddleware<F>: Middleware,
{
    fn from(handler: AsyncFnMiddleware<F>) -> Self { Self::handler(handler) }
}

impl<F> From<FnErrorHandler<F>> for ErrorHandlerRef
where
    FnErrorHandler<F>: ErrorHandler,
{
    fn from(handler: FnErrorHandler<F>) -> Self { Self::error_handler(handler) }
}

impl<F> From<AsyncFnErrorHandler<F>> for ErrorHandlerRef
where
    AsyncFnErrorHandler<F>: ErrorHandler,
{
    fn from(handler: AsyncFnErrorHandler<F>) -> Self { Self::error_handler(handler) }
}

impl From<DefaultErrorHandler> for ErrorHandlerRef {
    fn from(handler: DefaultErrorHandler) -> Self { Self::error_handler(handler) }
}
