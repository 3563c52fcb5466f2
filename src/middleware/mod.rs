//! Built-in middleware.
//!
//! Cross-cutting concerns that most `"default"` sets want:
//!
//! - [`trace`] logs every request entering the chain.
//! - [`request_id`] tags the request with a [`RequestId`] and echoes it back.
//!
//! ```rust
//! use tsu_sets::{MiddlewareRef, Registry, middleware};
//!
//! let registry = Registry::new();
//! registry.create_set("default", vec![
//!     MiddlewareRef::handler(middleware::request_id()),
//!     MiddlewareRef::handler(middleware::trace()),
//! ]);
//! ```

use std::future;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::error::HandlerError;
use crate::handler::{BoxFuture, Flow, Middleware};
use crate::request::Request;
use crate::response::Response;

/// Header read and written by [`request_id`].
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logs method, URL and request id (when present) at `INFO`.
pub fn trace() -> Trace {
    Trace
}

/// Returned by [`trace`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        _res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow, HandlerError>> {
        let id = req.extensions().get::<RequestId>().map(|id| id.0.as_str());
        info!(method = %req.method(), url = req.url(), request_id = id, "request");
        Box::pin(future::ready(Ok(Flow::Continue)))
    }
}

/// The request's id, stored in the request extensions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestId(pub String);

/// Reuses the incoming `x-request-id` header or assigns a sequential id,
/// stores it as a [`RequestId`] extension and sets it on the response.
pub fn request_id() -> RequestIds {
    RequestIds { next: AtomicU64::new(1) }
}

/// Returned by [`request_id`]. Each instance numbers its own requests.
#[derive(Debug)]
pub struct RequestIds {
    next: AtomicU64,
}

impl Middleware for RequestIds {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow, HandlerError>> {
        let id = match req.header(REQUEST_ID_HEADER) {
            Some(incoming) => incoming.to_owned(),
            None => self.next.fetch_add(1, Ordering::Relaxed).to_string(),
        };
        res.set_header(REQUEST_ID_HEADER, &id);
        req.extensions_mut().insert(RequestId(id));
        Box::pin(future::ready(Ok(Flow::Continue)))
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderName, HeaderValue, Method, Uri};

    use super::*;

    #[tokio::test]
    async fn request_id_reuses_incoming_header() {
        let mut req = Request::new(Method::GET, Uri::from_static("/"))
            .with_header(HeaderName::from_static(REQUEST_ID_HEADER), HeaderValue::from_static("abc-123"));
        let mut res = Response::new();

        request_id().call(&mut req, &mut res).await.unwrap();

        assert_eq!(req.extensions().get::<RequestId>(), Some(&RequestId("abc-123".into())));
        assert_eq!(res.header(REQUEST_ID_HEADER), Some("abc-123"));
    }

    #[tokio::test]
    async fn request_id_numbers_requests_sequentially() {
        let ids = request_id();
        for expected in ["1", "2"] {
            let mut req = Request::new(Method::GET, Uri::from_static("/"));
            let mut res = Response::new();
            ids.call(&mut req, &mut res).await.unwrap();
            assert_eq!(res.header(REQUEST_ID_HEADER), Some(expected));
        }
    }

    #[tokio::test]
    async fn trace_never_stops_the_chain() {
        let mut req = Request::new(Method::DELETE, Uri::from_static("/users/1"));
        let mut res = Response::new();
        assert_eq!(trace().call(&mut req, &mut res).await.unwrap(), Flow::Continue);
        assert!(!res.is_sent());
    }
}
