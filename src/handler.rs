//! Handler traits and type erasure.
//!
//! # How handlers are stored
//!
//! A set mixes handlers of *different* concrete types in one `Vec`, so every
//! handler is stored as a trait object behind an `Arc`:
//!
//! ```text
//! |req, res| { … }                      ← user writes this
//!        ↓ from_fn(…)
//! FnMiddleware(closure)                 ← concrete wrapper
//!        ↓ .into()  (HandlerRef::Handler)
//! Arc<dyn Middleware>                   ← BoxedMiddleware, shared by every pipeline
//!        ↓ handler.call(&mut req, &mut res)
//! BoxFuture<'_, Result<Flow, HandlerError>>
//! ```
//!
//! Handlers borrow the request and response for the duration of one call.
//! The borrow ends when the returned future completes, which is what makes
//! the chain strictly sequential: handler *n + 1* cannot even be called
//! until handler *n* has given the borrows back.

use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::request::Request;
use crate::response::{IntoReply, Reply, Response};

/// A heap-allocated, type-erased future borrowing from the call arguments.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A middleware handler shared across sets and pipelines.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An error-chain handler shared across sets and pipelines.
pub type BoxedErrorHandler = Arc<dyn ErrorHandler>;

/// The terminal handler of a pipeline.
pub type BoxedTerminal = Arc<dyn Terminal>;

// ── Flow ──────────────────────────────────────────────────────────────────────

/// What the pipeline does after a main-chain handler returns.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Flow {
    /// Run the next handler (or the terminal handler).
    #[default]
    Continue,
    /// The handler answered the request. Skip the rest of the chain and
    /// the terminal handler.
    Stop,
}

/// Conversion of a handler's return value into a [`Flow`].
///
/// | Return type | Meaning |
/// |---|---|
/// | `()` | `Flow::Continue` |
/// | `Flow` | itself |
/// | `Result<T, E>` | `T`'s flow, or `E` converted into a [`HandlerError`] |
pub trait IntoFlow {
    fn into_flow(self) -> Result<Flow, HandlerError>;
}

impl IntoFlow for () {
    fn into_flow(self) -> Result<Flow, HandlerError> { Ok(Flow::Continue) }
}

impl IntoFlow for Flow {
    fn into_flow(self) -> Result<Flow, HandlerError> { Ok(self) }
}

impl<T, E> IntoFlow for Result<T, E>
where
    T: IntoFlow,
    E: Into<HandlerError>,
{
    fn into_flow(self) -> Result<Flow, HandlerError> {
        self.map_err(Into::into).and_then(IntoFlow::into_flow)
    }
}

impl IntoReply for Flow {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Empty) }
}

/// Conversion of an error handler's return value: `()` or `Result<(), E>`.
///
/// There is no [`Flow`] here; every error handler in the chain runs.
pub trait IntoErrorOutcome {
    fn into_outcome(self) -> Result<(), HandlerError>;
}

impl IntoErrorOutcome for () {
    fn into_outcome(self) -> Result<(), HandlerError> { Ok(()) }
}

impl<E: Into<HandlerError>> IntoErrorOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), HandlerError> { self.map_err(Into::into) }
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// A main-chain handler that runs before the terminal handler.
///
/// Closures are adapted with [`from_fn`] and [`from_async`]. Implement the
/// trait directly for handlers that carry configuration.
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow, HandlerError>>;
}

/// The last handler of a pipeline.
///
/// It runs only when every middleware continued. The returned [`Reply`] is
/// written into the response unless a handler already sent it. The closure
/// adapters implement this trait whenever the closure returns an
/// [`IntoReply`] value.
pub trait Terminal: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Reply, HandlerError>>;
}

/// A handler in the error chain. Receives the error that stopped the main chain.
pub trait ErrorHandler: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        err: &'a HandlerError,
    ) -> BoxFuture<'a, Result<(), HandlerError>>;
}

// ── Closure adapters ──────────────────────────────────────────────────────────

/// Adapts a synchronous closure into [`Middleware`] (when it returns an
/// [`IntoFlow`] value) or a [`Terminal`] (when it returns an [`IntoReply`]
/// value).
///
/// ```rust
/// use tsu_sets::{Flow, HandlerError, from_fn};
///
/// let auth = from_fn(|req, res| {
///     if req.header("authorization").is_none() {
///         res.send(401, "unauthorized");
///         return Ok::<_, HandlerError>(Flow::Stop);
///     }
///     Ok(Flow::Continue)
/// });
/// ```
pub fn from_fn<F, R>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response) -> R + Send + Sync + 'static,
{
    FnMiddleware(f)
}

/// Adapts a closure returning a boxed future into [`Middleware`] or a
/// [`Terminal`], like [`from_fn`].
///
/// The future may borrow the request and response:
///
/// ```rust
/// use tsu_sets::from_async;
///
/// let slow = from_async(|req, _res| Box::pin(async move {
///     tokio::task::yield_now().await;
///     req.extensions_mut().insert(42u32);
/// }));
/// ```
pub fn from_async<F, R>(f: F) -> AsyncFnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, R> + Send + Sync + 'static,
    R: 'static,
{
    AsyncFnMiddleware(f)
}

/// Adapts a synchronous closure into an [`ErrorHandler`].
///
/// The closure returns `()` or `Result<(), E>`. A [`Flow`] is rejected:
///
/// ```rust,compile_fail
/// use tsu_sets::{Flow, error_fn};
///
/// let handler = error_fn(|_req, _res, _err| Flow::Stop);
/// ```
pub fn error_fn<F, R>(f: F) -> FnErrorHandler<F>
where
    F: Fn(&mut Request, &mut Response, &HandlerError) -> R + Send + Sync + 'static,
    R: IntoErrorOutcome,
{
    FnErrorHandler(f)
}

/// Adapts a closure returning a boxed future into an [`ErrorHandler`].
pub fn async_error_fn<F, R>(f: F) -> AsyncFnErrorHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, &'a HandlerError) -> BoxFuture<'a, R>
        + Send
        + Sync
        + 'static,
    R: IntoErrorOutcome + 'static,
{
    AsyncFnErrorHandler(f)
}

/// Returned by [`from_fn`].
pub struct FnMiddleware<F>(F);

/// Returned by [`from_async`].
pub struct AsyncFnMiddleware<F>(F);

/// Returned by [`error_fn`].
pub struct FnErrorHandler<F>(F);

/// Returned by [`async_error_fn`].
pub struct AsyncFnErrorHandler<F>(F);

impl<F, R> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response) -> R + Send + Sync + 'static,
    R: IntoFlow,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow, HandlerError>> {
        // Run now; the future only carries the outcome.
        Box::pin(future::ready((self.0)(req, res).into_flow()))
    }
}

impl<F, R> Terminal for FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response) -> R + Send + Sync + 'static,
    R: IntoReply,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Reply, HandlerError>> {
        Box::pin(future::ready((self.0)(req, res).into_reply()))
    }
}

impl<F, R> Middleware for AsyncFnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, R> + Send + Sync + 'static,
    R: IntoFlow + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow, HandlerError>> {
        let fut = (self.0)(req, res);
        Box::pin(async move { fut.await.into_flow() })
    }
}

impl<F, R> Terminal for AsyncFnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, R> + Send + Sync + 'static,
    R: IntoReply + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Reply, HandlerError>> {
        let fut = (self.0)(req, res);
        Box::pin(async move { fut.await.into_reply() })
    }
}

impl<F, R> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(&mut Request, &mut Response, &HandlerError) -> R + Send + Sync + 'static,
    R: IntoErrorOutcome,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        err: &'a HandlerError,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(future::ready((self.0)(req, res, err).into_outcome()))
    }
}

impl<F, R> ErrorHandler for AsyncFnErrorHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, &'a HandlerError) -> BoxFuture<'a, R>
        + Send
        + Sync
        + 'static,
    R: IntoErrorOutcome + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        err: &'a HandlerError,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        let fut = (self.0)(req, res, err);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
