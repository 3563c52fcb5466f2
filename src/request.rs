//! Incoming HTTP request type.

use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri};

/// An incoming HTTP request as seen by middleware.
///
/// Middleware passes state down the chain through [`extensions`](Request::extensions_mut):
///
/// ```rust
/// use tsu_sets::Request;
///
/// #[derive(Clone)]
/// struct User { id: String }
///
/// let mut req = Request::new(http::Method::GET, http::Uri::from_static("/me"));
/// req.extensions_mut().insert(User { id: "foobar".into() });
/// assert_eq!(req.extensions().get::<User>().unwrap().id, "foobar");
/// ```
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    extensions: Extensions,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            extensions: Extensions::new(),
        }
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            extensions: parts.extensions,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Path plus query string, e.g. `/users?page=2`.
    pub fn url(&self) -> &str {
        self.uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), |pq| pq.as_str())
    }

    /// Header lookup. `HeaderMap` keys are already case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_keeps_query_string() {
        let req = Request::new(Method::GET, Uri::from_static("/users?page=2"));
        assert_eq!(req.path(), "/users");
        assert_eq!(req.url(), "/users?page=2");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::new(Method::POST, Uri::from_static("/"))
            .with_header(HeaderName::from_static("x-request-id"), HeaderValue::from_static("abc"))
            .with_body("payload");
        assert_eq!(req.header("X-Request-Id"), Some("abc"));
        assert_eq!(req.body(), b"payload");
    }
}
