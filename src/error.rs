//! Error types.
//!
//! Two layers:
//!
//! - [`Error`] is what the crate's own operations return: resolving a set,
//!   running a [`Pipeline`](crate::Pipeline), binding the server.
//! - [`HandlerError`] is the value a handler fails with. It carries the
//!   HTTP-ish fields the error chain consumes (status, body, headers).

use std::backtrace::Backtrace;
use std::fmt;

/// The error type returned by tsu-sets' fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A name reference points at a set that was never registered.
    #[error("unknown middleware set `{0}`")]
    UnknownSet(String),

    /// A set references itself, directly or through other sets.
    /// Holds the chain of names that closes the loop.
    #[error("cyclic middleware set: {}", .0.join(" -> "))]
    CyclicSet(Vec<String>),

    /// A main-chain handler failed and no error handlers were registered.
    #[error("handler failed: {0}")]
    Handler(HandlerError),

    /// A handler in the error chain failed. There is no second recovery.
    #[error("error handler failed: {0}")]
    ErrorHandler(HandlerError),

    #[error("invalid socket address `{0}`")]
    InvalidAddr(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The handler error carried by [`Error::Handler`] or [`Error::ErrorHandler`].
    pub fn handler_error(&self) -> Option<&HandlerError> {
        match self {
            Self::Handler(e) | Self::ErrorHandler(e) => Some(e),
            _ => None,
        }
    }
}

// ── HandlerError ──────────────────────────────────────────────────────────────

/// The value a handler fails with.
///
/// Every field but the message is optional. The default error handler reads
/// them to build the response:
///
/// | Field | Used as | Fallback |
/// |---|---|---|
/// | `status` | response status | `500` |
/// | `body` | response body | `message` |
/// | `headers` | copied onto the response | none |
///
/// ```rust
/// use tsu_sets::HandlerError;
///
/// let err = HandlerError::new("404 not found")
///     .with_status(404)
///     .with_header("foo", "bar");
/// assert_eq!(err.status_or_default(), 404);
/// assert_eq!(err.body(), "404 not found");
/// ```
///
/// `HandlerError` deliberately does not implement [`std::error::Error`]: that
/// keeps the blanket `From<E: std::error::Error>` conversion coherent, so `?`
/// works on any standard error inside a handler.
pub struct HandlerError {
    message: String,
    status: Option<u16>,
    body: Option<String>,
    headers: Vec<(String, String)>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            body: None,
            headers: Vec::new(),
            source: None,
            backtrace: Backtrace::capture(),
        }
    }

    /// Shorthand for `HandlerError::new(message).with_status(status)`.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::new(message).with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Response body to send instead of the message.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Header copied onto the response by the default error handler.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn message(&self) -> &str { &self.message }
    pub fn status_code(&self) -> Option<u16> { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn backtrace(&self) -> &Backtrace { &self.backtrace }

    /// Status to respond with: the explicit status, else `500`.
    pub fn status_or_default(&self) -> u16 {
        self.status.unwrap_or(500)
    }

    /// Body to respond with: the explicit body, else the message.
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or(&self.message)
    }

    /// The underlying error, if this value was converted from one.
    pub fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        let mut err = Self::new(e.to_string());
        err.source = Some(Box::new(e));
        err
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("message", &self.message)
            .field("status", &self.status)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
