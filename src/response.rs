//! Outgoing HTTP response type.
//!
//! Unlike a plain handler framework, a middleware chain shares one response
//! between every handler, so [`Response`] is written in place: any handler
//! may set headers, and whichever handler answers calls one of the `send`
//! family. The host turns it into wire bytes afterwards.
//!
//! A terminal handler may instead return a [`Reply`]; the pipeline writes it
//! into the response when nothing else has.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use tracing::warn;

use crate::error::HandlerError;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Response::bytes`].
pub enum ContentType {
    Csv,          // text/csv
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The response shared by every handler of one pipeline run.
///
/// ```rust
/// use tsu_sets::Response;
///
/// let mut res = Response::new();
/// res.set_header("cache-control", "no-store");
/// res.json(201, br#"{"id":42}"#.to_vec());
///
/// assert_eq!(res.status(), 201);
/// assert_eq!(res.header("Content-Type"), Some("application/json"));
/// assert!(res.is_sent());
/// ```
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    sent: bool,
}

impl Response {
    /// An unsent `200` response with no headers and no body.
    pub fn new() -> Self {
        Self { status: 200, headers: Vec::new(), body: Vec::new(), sent: false }
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// `true` once any handler has called a `send`-family method.
    pub fn is_sent(&self) -> bool { self.sent }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any existing value under the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Writes status and body. Headers set earlier are kept as they are.
    pub fn send(&mut self, status: u16, body: impl Into<Vec<u8>>) {
        self.status = status;
        self.body = body.into();
        self.sent = true;
    }

    /// `text/plain; charset=utf-8`.
    pub fn text(&mut self, status: u16, body: impl Into<String>) {
        self.bytes(status, ContentType::Text, body.into().into_bytes());
    }

    /// `application/json`. Pass bytes straight from your serialiser.
    pub fn json(&mut self, status: u16, body: Vec<u8>) {
        self.bytes(status, ContentType::Json, body);
    }

    /// Typed body. Use this for XML, HTML, CSV or binary data.
    pub fn bytes(&mut self, status: u16, content_type: ContentType, body: Vec<u8>) {
        self.set_header("content-type", content_type.as_str());
        self.send(status, body);
    }

    /// Converts into the host layer's response type.
    ///
    /// A status outside `100..=999` becomes `500`; header pairs that are not
    /// valid HTTP are dropped with a warning.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = StatusCode::from_u16(self.status).unwrap_or_else(|_| {
            warn!(status = self.status, "invalid response status, sending 500");
            StatusCode::INTERNAL_SERVER_ERROR
        });

        let headers = res.headers_mut();
        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        res
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

// ── Reply ────────────────────────────────────────────────────────────────────

/// A body returned by a terminal handler instead of written into the response.
///
/// The reply is sent with the response's current status (200 unless a
/// handler changed it). It is discarded if a handler already sent the
/// response.
#[derive(Debug, Default, Eq, PartialEq)]
pub enum Reply {
    /// Nothing to write.
    #[default]
    Empty,
    /// `text/plain; charset=utf-8`.
    Text(String),
    /// `application/json`, already serialised.
    Json(Vec<u8>),
    /// `application/octet-stream`.
    Bytes(Vec<u8>),
}

impl Reply {
    pub(crate) fn write_to(self, res: &mut Response) {
        let status = res.status();
        match self {
            Self::Empty => {}
            Self::Text(body) => res.text(status, body),
            Self::Json(body) => res.json(status, body),
            Self::Bytes(body) => res.bytes(status, ContentType::OctetStream, body),
        }
    }
}

/// Conversion of a terminal handler's return value into a [`Reply`].
///
/// | Return type | Reply |
/// |---|---|
/// | `()`, [`Flow`](crate::Flow) | `Empty` |
/// | `String`, `&'static str` | `Text` |
/// | `Vec<u8>`, `Bytes` | `Bytes` |
/// | `Result<T, E>` | `T`'s reply, or `E` converted into a [`HandlerError`] |
///
/// Implement it on your own types to return them from terminal handlers:
///
/// ```rust
/// use tsu_sets::{HandlerError, IntoReply, Reply};
///
/// struct Greeting(&'static str);
///
/// impl IntoReply for Greeting {
///     fn into_reply(self) -> Result<Reply, HandlerError> {
///         Ok(Reply::Json(format!(r#"{{"hello":"{}"}}"#, self.0).into_bytes()))
///     }
/// }
///
/// assert_eq!(Greeting("world").into_reply().unwrap(), Reply::Json(br#"{"hello":"world"}"#.to_vec()));
/// ```
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, HandlerError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(self) }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Empty) }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Text(self)) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Text(self.to_owned())) }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Bytes(self)) }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Bytes(self.to_vec())) }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<HandlerError>,
{
    fn into_reply(self) -> Result<Reply, HandlerError> {
        self.map_err(Into::into).and_then(IntoReply::into_reply)
    }
}
