//! # tsu-sets
//!
//! Named, reusable middleware sets for HTTP services, with one place to
//! recover from errors.
//!
//! ## The model
//!
//! - A **set** is a named, ordered list of handlers and references to other
//!   sets, stored in a [`Registry`].
//! - A **pipeline** is a set (or an ad-hoc list) flattened into concrete
//!   handlers and bound to a terminal handler. The terminal handler writes
//!   the response itself or returns a [`Reply`] for the pipeline to write.
//! - Each handler returns a [`Flow`]: `Continue` to the next handler, or
//!   `Stop` after answering the request itself.
//! - When a handler fails, the registry's `"errorHandler"` set turns the
//!   [`HandlerError`] into a response. By default that is
//!   [`DefaultErrorHandler`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tsu_sets::{HandlerError, MiddlewareRef, Registry, Server, from_fn, middleware};
//!
//! #[derive(Clone)]
//! struct User { id: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsu_sets::Error> {
//!     let registry = Arc::new(Registry::new());
//!
//!     registry.create_set("default", MiddlewareRef::handler(middleware::trace()));
//!     registry.create_set("auth", vec![
//!         MiddlewareRef::from("default"),
//!         from_fn(|req, _res| {
//!             let user = req.header("x-user").ok_or_else(|| HandlerError::status(401, "who are you?"))?;
//!             let user = User { id: user.to_owned() };
//!             req.extensions_mut().insert(user);
//!             Ok::<_, HandlerError>(())
//!         }).into(),
//!     ]);
//!
//!     let app = registry.apply_middleware("auth", from_fn(|req, res| {
//!         let id = req.extensions().get::<User>().map_or("anonymous", |u| u.id.as_str());
//!         res.text(200, format!("hello, {id}"));
//!     }))?;
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//! ```

mod error;
mod error_handler;
mod handler;
mod pipeline;
mod registry;
mod request;
mod resolve;
mod response;
mod server;
mod set;

pub mod middleware;

pub use error::{Error, HandlerError};
pub use error_handler::{
    DefaultErrorHandler, ErrorHandlerOptions, ErrorLog, TracingLog, default_error_handler,
};
pub use handler::{
    AsyncFnErrorHandler, AsyncFnMiddleware, BoxFuture, BoxedErrorHandler, BoxedMiddleware,
    BoxedTerminal, ErrorHandler, Flow, FnErrorHandler, FnMiddleware, IntoErrorOutcome, IntoFlow,
    Middleware, Terminal, async_error_fn, error_fn, from_async, from_fn,
};
pub use pipeline::Pipeline;
pub use registry::{DEFAULT_SET, ERROR_HANDLER_SET, Registry};
pub use request::Request;
pub use response::{ContentType, IntoReply, Reply, Response};
pub use server::Server;
pub use set::{ErrorHandlerRef, HandlerRef, MiddlewareRef};
