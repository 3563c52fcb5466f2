//! Pipeline execution.
//!
//! A [`Pipeline`] is a resolved middleware list bound to a terminal handler.
//! One call to [`Pipeline::handle`] runs one request through it:
//!
//! ```text
//!  Running(0) ──Continue──▶ Running(1) ──▶ … ──▶ terminal ──▶ reply ──▶ Ok
//!      │                        │                   │
//!      │ Stop ──────────────────┴───────────────────┼──────▶ Ok (response already written)
//!      │                                            │
//!      └──── Err ───────────────┴───────────────────┘
//!                   │
//!                   ▼
//!        "errorHandler" set empty? ── yes ──▶ Err(Error::Handler)
//!                   │ no
//!                   ▼
//!        error handlers, in order ── Err ──▶ Err(Error::ErrorHandler)
//!                   │
//!                   ▼
//!                   Ok
//! ```
//!
//! Every step is awaited before the next starts. Handlers never overlap
//! within one request; separate requests run independently.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::error::{Error, HandlerError};
use crate::handler::{BoxedMiddleware, BoxedTerminal, Flow, Terminal};
use crate::registry::{DEFAULT_SET, Registry};
use crate::request::Request;
use crate::response::Response;
use crate::set::{HandlerRef, MiddlewareRef};

/// A resolved middleware chain plus its terminal handler.
///
/// Cheap to clone: the handler list and the registry are shared.
#[derive(Clone)]
pub struct Pipeline {
    handlers: Arc<[BoxedMiddleware]>,
    terminal: BoxedTerminal,
    registry: Arc<Registry>,
}

impl Pipeline {
    /// Resolves `middleware` (the `"default"` set when `None`) and binds it to
    /// `terminal`.
    ///
    /// Resolution happens once, here. Sets registered or replaced afterwards do
    /// not change this pipeline's main chain, but the error chain is looked up
    /// on every failure.
    pub fn build(
        registry: Arc<Registry>,
        middleware: Option<MiddlewareRef>,
        terminal: impl Terminal,
    ) -> Result<Self, Error> {
        let middleware = middleware.unwrap_or_else(|| HandlerRef::name(DEFAULT_SET));
        let handlers = registry.resolve(&middleware)?;
        debug!(handlers = handlers.len(), middleware = ?middleware, "pipeline resolved");

        Ok(Self {
            handlers: handlers.into(),
            terminal: Arc::new(terminal),
            registry,
        })
    }

    /// Number of resolved middleware handlers, terminal handler excluded.
    pub fn len(&self) -> usize { self.handlers.len() }
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    /// Runs one request through the pipeline.
    ///
    /// Returns `Ok(())` when the chain completes, stops early, or fails and is
    /// recovered by the error chain. Otherwise:
    ///
    /// - [`Error::Handler`]: a handler failed and the `"errorHandler"` set is
    ///   absent or empty.
    /// - [`Error::ErrorHandler`]: an error handler failed.
    /// - [`Error::UnknownSet`] / [`Error::CyclicSet`]: the `"errorHandler"` set
    ///   does not resolve. The original error is logged.
    pub async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        let err = match self.run_main(req, res).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let chain = match self.registry.error_chain() {
            Ok(chain) => chain,
            Err(resolve_err) => {
                error!(error = %err, "handler failed and the error chain does not resolve: {resolve_err}");
                return Err(resolve_err);
            }
        };
        if chain.is_empty() {
            return Err(Error::Handler(err));
        }

        debug!(error = %err, handlers = chain.len(), "running error chain");
        for handler in &chain {
            handler.call(req, res, &err).await.map_err(Error::ErrorHandler)?;
        }
        Ok(())
    }

    async fn run_main(&self, req: &mut Request, res: &mut Response) -> Result<(), HandlerError> {
        for (index, handler) in self.handlers.iter().enumerate() {
            if handler.call(req, res).await? == Flow::Stop {
                trace!(index, "middleware stopped the chain");
                return Ok(());
            }
        }
        let reply = self.terminal.call(req, res).await?;
        if !res.is_sent() {
            reply.write_to(res);
        }
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, Uri};

    use super::*;
    use crate::handler::from_fn;

    fn pair() -> (Request, Response) {
        (Request::new(Method::GET, Uri::from_static("/")), Response::new())
    }

    #[test]
    fn build_resolves_default_set_when_none_given() {
        let registry = Arc::new(Registry::new());
        let set: Vec<MiddlewareRef> = vec![
            from_fn(|_req, _res| {}).into(),
            from_fn(|_req, _res| {}).into(),
        ];
        registry.create_set(DEFAULT_SET, set);

        let pipeline = Pipeline::build(registry, None, from_fn(|_req, _res| {})).unwrap();
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn build_fails_on_unknown_set() {
        let registry = Arc::new(Registry::new());
        let result = registry.apply_middleware("nope", from_fn(|_req, _res| {}));
        assert!(matches!(result, Err(Error::UnknownSet(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn main_chain_is_fixed_at_build_time() {
        let registry = Arc::new(Registry::new());
        registry.create_set("s", from_fn(|_req, res: &mut Response| res.set_header("a", "1")));
        let pipeline = registry.apply_middleware("s", from_fn(|_req, _res| {})).unwrap();

        registry.create_set("s", from_fn(|_req, res: &mut Response| res.set_header("b", "1")));
        let (mut req, mut res) = pair();
        pipeline.handle(&mut req, &mut res).await.unwrap();

        assert_eq!(res.header("a"), Some("1"));
        assert_eq!(res.header("b"), None);
    }

    #[tokio::test]
    async fn terminal_reply_is_written_when_nothing_was_sent() {
        let registry = Arc::new(Registry::new());
        let pipeline = registry.apply(from_fn(|_req, _res| "plain")).unwrap();

        let (mut req, mut res) = pair();
        pipeline.handle(&mut req, &mut res).await.unwrap();
        assert_eq!(res.body(), b"plain");
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[tokio::test]
    async fn terminal_reply_never_overwrites_a_sent_response() {
        let registry = Arc::new(Registry::new());
        let pipeline = registry
            .apply(from_fn(|_req, res: &mut Response| {
                res.send(202, "accepted");
                "ignored"
            }))
            .unwrap();

        let (mut req, mut res) = pair();
        pipeline.handle(&mut req, &mut res).await.unwrap();
        assert_eq!(res.status(), 202);
        assert_eq!(res.body(), b"accepted");
        assert_eq!(res.header("content-type"), None);
    }

    #[tokio::test]
    async fn error_chain_failure_is_not_recovered() {
        let registry = Arc::new(Registry::new());
        registry.create_error_set(
            crate::registry::ERROR_HANDLER_SET,
            crate::handler::error_fn(|_req, _res, _err| Err::<(), _>(HandlerError::new("second failure"))),
        );
        let pipeline = registry
            .apply(from_fn(|_req, _res| Err::<(), _>(HandlerError::new("first failure"))))
            .unwrap();

        let (mut req, mut res) = pair();
        match pipeline.handle(&mut req, &mut res).await {
            Err(Error::ErrorHandler(e)) => assert_eq!(e.message(), "second failure"),
            other => panic!("expected ErrorHandler, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unresolvable_error_chain_surfaces_resolution_error() {
        let registry = Arc::new(Registry::new());
        registry.create_error_set(crate::registry::ERROR_HANDLER_SET, "missing");
        let pipeline = registry
            .apply(from_fn(|_req, _res| Err::<(), _>(HandlerError::new("boom"))))
            .unwrap();

        let (mut req, mut res) = pair();
        let err = pipeline.handle(&mut req, &mut res).await.unwrap_err();
        assert!(matches!(err, Error::UnknownSet(name) if name == "missing"));
    }
}
