//! HTTP server and graceful shutdown.
//!
//! The server is the host layer for a single [`Pipeline`]: every request on
//! every connection runs through it. Put routing, if you need any, in the
//! terminal handler.
//!
//! # Shutdown
//!
//! SIGTERM or Ctrl-C stops the accept loop at once. Connections already
//! open finish their in-flight requests, then [`Server::serve`] returns.
//! Under an orchestrator that sends SIGTERM before a kill, keep the grace
//! period longer than the slowest request.

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`) when
    /// [`serve`](Server::serve) is called.
    ///
    /// ```rust,no_run
    /// use tsu_sets::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Starts accepting connections and running each request through
    /// `pipeline`.
    ///
    /// Fails with [`Error::InvalidAddr`] if the address does not parse.
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, pipeline: Pipeline) -> Result<(), Error> {
        let addr: SocketAddr = self.addr.parse().map_err(|_| Error::InvalidAddr(self.addr.clone()))?;
        let listener = TcpListener::bind(addr).await?;

        info!(%addr, middleware = pipeline.len(), "tsu-sets listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown wins over queued connections.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let pipeline = pipeline.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let pipeline = pipeline.clone();
                            async move { dispatch(pipeline, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tsu-sets stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads the request body, then hands the request to [`respond`].
///
/// A body that cannot be read is answered with a bare `400` without running
/// the pipeline.
async fn dispatch(
    pipeline: Pipeline,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            let mut res = Response::new();
            res.send(400, "");
            return Ok(res.into_inner());
        }
    };

    Ok(respond(&pipeline, parts, body).await)
}

/// Runs one request through the pipeline and produces one response.
///
/// An error that escapes the pipeline is logged and replaces whatever the
/// handlers wrote with a bare `500`.
async fn respond(
    pipeline: &Pipeline,
    parts: http::request::Parts,
    body: Bytes,
) -> http::Response<Full<Bytes>> {
    let mut req = Request::from_parts(parts, body);
    let mut res = Response::new();

    let outcome = pipeline.handle(&mut req, &mut res).await;
    if let Err(e) = outcome {
        error!(method = %req.method(), url = req.url(), "unhandled pipeline error: {e}");
        res = Response::new();
        res.send(500, "");
    }

    res.into_inner()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM or Ctrl-C, whichever comes first. SIGTERM is only
/// watched on Unix. A signal that cannot be installed is logged and never
/// fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::StatusCode;

    use super::*;
    use crate::error::HandlerError;
    use crate::handler::from_fn;
    use crate::registry::{ERROR_HANDLER_SET, Registry};
    use crate::set::{ErrorHandlerRef, MiddlewareRef};

    fn get(path: &'static str) -> http::request::Parts {
        let (parts, ()) = http::Request::get(path).body(()).unwrap().into_parts();
        parts
    }

    /// A set that tags the response, then fails with a 404.
    fn failing_set(registry: &Registry) {
        let set: Vec<MiddlewareRef> = vec![
            from_fn(|_req, res: &mut Response| res.set_header("x-seen", "1")).into(),
            from_fn(|_req, _res| {
                Err::<(), _>(HandlerError::status(404, "no such thing").with_header("x-reason", "gone"))
            })
            .into(),
        ];
        registry.create_set("failing", set);
    }

    async fn body_of(res: http::Response<Full<Bytes>>) -> Bytes {
        res.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn escaped_error_becomes_bare_500() {
        let registry = Arc::new(Registry::new());
        registry.create_error_set(ERROR_HANDLER_SET, ErrorHandlerRef::List(Vec::new()));
        failing_set(&registry);
        let pipeline = registry.apply_middleware("failing", from_fn(|_req, _res| {})).unwrap();

        let res = respond(&pipeline, get("/things/7"), Bytes::new()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.headers().get("x-seen").is_none());
        assert!(res.headers().get("x-reason").is_none());
        assert!(body_of(res).await.is_empty());
    }

    #[tokio::test]
    async fn recovered_error_keeps_error_handler_response() {
        let registry = Arc::new(Registry::new());
        failing_set(&registry);
        let pipeline = registry.apply_middleware("failing", from_fn(|_req, _res| {})).unwrap();

        let res = respond(&pipeline, get("/things/7"), Bytes::new()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["x-reason"], "gone");
        assert_eq!(res.headers()["x-seen"], "1");
        assert_eq!(body_of(res).await, "no such thing");
    }

    #[tokio::test]
    async fn terminal_reply_reaches_the_wire() {
        let registry = Arc::new(Registry::new());
        let echo = from_fn(|req: &mut Request, _res| String::from_utf8_lossy(req.body()).into_owned());
        let pipeline = registry.apply(echo).unwrap();

        let res = respond(&pipeline, get("/echo"), Bytes::from_static(b"ping")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
        assert_eq!(body_of(res).await, "ping");
    }
}
