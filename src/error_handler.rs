//! The default error handler.
//!
//! [`Registry::new`](crate::Registry::new) registers one of these as the
//! `"errorHandler"` set, so every pipeline turns a failing handler into an
//! HTTP response out of the box:
//!
//! | Response field | Taken from |
//! |---|---|
//! | headers | [`HandlerError::headers`], copied one by one |
//! | status | [`HandlerError::status_or_default`] (`500` when unset) |
//! | body | [`HandlerError::body`] (the message when unset) |
//!
//! and logs `METHOD URL - Error STATUS: BODY` with the error's backtrace.
//! Replace the set to change any of this.

use std::backtrace::BacktraceStatus;
use std::fmt;
use std::future;
use std::sync::Arc;

use tracing::error;

use crate::error::HandlerError;
use crate::handler::{BoxFuture, ErrorHandler};
use crate::request::Request;
use crate::response::Response;

/// Log sink for [`DefaultErrorHandler`].
pub trait ErrorLog: Send + Sync + 'static {
    /// `stack` is the rendered backtrace, when one was captured.
    fn error(&self, line: &str, stack: Option<&str>);
}

/// Logs through `tracing` at `ERROR` level. The default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLog;

impl ErrorLog for TracingLog {
    fn error(&self, line: &str, stack: Option<&str>) {
        match stack {
            Some(stack) => error!(stack, "{line}"),
            None => error!("{line}"),
        }
    }
}

/// Options for [`default_error_handler`].
///
/// ```rust
/// use tsu_sets::{ErrorHandlerOptions, default_error_handler};
///
/// // Quiet handler: responds, never logs.
/// let handler = default_error_handler(ErrorHandlerOptions::new().log_errors(false));
/// ```
#[derive(Clone)]
pub struct ErrorHandlerOptions {
    log_errors: bool,
    logger: Arc<dyn ErrorLog>,
}

impl ErrorHandlerOptions {
    pub fn new() -> Self {
        Self { log_errors: true, logger: Arc::new(TracingLog) }
    }

    /// Whether to log each handled error. Defaults to `true`.
    pub fn log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    /// Where log lines go. Defaults to [`TracingLog`].
    pub fn logger(mut self, logger: impl ErrorLog) -> Self {
        self.logger = Arc::new(logger);
        self
    }
}

impl Default for ErrorHandlerOptions {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for ErrorHandlerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlerOptions")
            .field("log_errors", &self.log_errors)
            .finish_non_exhaustive()
    }
}

/// Builds the default error handler.
pub fn default_error_handler(options: ErrorHandlerOptions) -> DefaultErrorHandler {
    DefaultErrorHandler { options }
}

/// Maps a [`HandlerError`] onto the response and logs it.
#[derive(Clone, Debug, Default)]
pub struct DefaultErrorHandler {
    options: ErrorHandlerOptions,
}

impl DefaultErrorHandler {
    fn handle(&self, req: &Request, res: &mut Response, err: &HandlerError) {
        for (name, value) in err.headers() {
            res.set_header(name, value);
        }

        let status = err.status_or_default();
        res.send(status, err.body());

        if self.options.log_errors {
            let line = format!("{} {} - Error {status}: {}", req.method(), req.url(), err.body());
            let stack = match err.backtrace().status() {
                BacktraceStatus::Captured => Some(err.backtrace().to_string()),
                _ => None,
            };
            self.options.logger.error(&line, stack.as_deref());
        }
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        err: &'a HandlerError,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        self.handle(req, res, err);
        Box::pin(future::ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, Uri};
    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<String>>>);

    impl ErrorLog for Capture {
        fn error(&self, line: &str, _stack: Option<&str>) {
            self.0.lock().push(line.to_owned());
        }
    }

    fn run(handler: &DefaultErrorHandler, err: HandlerError) -> Response {
        let req = Request::new(Method::GET, Uri::from_static("/users/42?full=1"));
        let mut res = Response::new();
        handler.handle(&req, &mut res, &err);
        res
    }

    #[test]
    fn maps_status_body_and_headers() {
        let handler = default_error_handler(ErrorHandlerOptions::new().log_errors(false));
        let res = run(
            &handler,
            HandlerError::status(404, "404 not found").with_header("foo", "bar"),
        );

        assert_eq!(res.status(), 404);
        assert_eq!(res.body(), b"404 not found");
        assert_eq!(res.header("foo"), Some("bar"));
        assert!(res.is_sent());
    }

    #[test]
    fn falls_back_to_500() {
        let handler = default_error_handler(ErrorHandlerOptions::new().log_errors(false));
        let res = run(&handler, HandlerError::new("database unavailable"));
        assert_eq!(res.status(), 500);
        assert_eq!(res.body(), b"database unavailable");
    }

    #[test]
    fn logs_method_url_status_and_body() {
        let capture = Capture::default();
        let handler = default_error_handler(ErrorHandlerOptions::new().logger(capture.clone()));
        run(&handler, HandlerError::status(403, "nope").with_body("forbidden"));

        assert_eq!(*capture.0.lock(), ["GET /users/42?full=1 - Error 403: forbidden"]);
    }

    #[test]
    fn stays_quiet_when_logging_is_off() {
        let capture = Capture::default();
        let handler = default_error_handler(
            ErrorHandlerOptions::new().log_errors(false).logger(capture.clone()),
        );
        run(&handler, HandlerError::new("boom"));

        assert!(capture.0.lock().is_empty());
    }
}
