//! HTTP request header handling.
//!
//! Wraps the standard `http::Request<()>` and answers the questions the transport
//! asks once a header is decoded: which path was requested, whether the peer accepts
//! a gzip encoded response and whether the connection may be kept open.

use http::{HeaderMap, Method, Request, Uri, Version, header};

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the path component of the request target, without the query.
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the peer listed `gzip` in `Accept-Encoding` with a non-zero quality.
    pub fn accepts_gzip(&self) -> bool {
        self.headers()
            .get_all(header::ACCEPT_ENCODING)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(accepts_coding_gzip)
    }

    /// Whether the connection stays open after the response.
    ///
    /// HTTP/1.1 is persistent unless the peer sent `Connection: close`,
    /// HTTP/1.0 only when it asked for `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get(header::CONNECTION).and_then(|value| value.to_str().ok());
        match self.version() {
            Version::HTTP_11 => !connection.is_some_and(|value| value.eq_ignore_ascii_case("close")),
            Version::HTTP_10 => connection.is_some_and(|value| value.eq_ignore_ascii_case("keep-alive")),
            _ => false,
        }
    }

    /// Determines if this request may carry a body based on its HTTP method.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }
}

/// Converts a bodyless request into a RequestHeader.
impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

/// A single `Accept-Encoding` entry such as `gzip;q=0.5`.
///
/// `q=0` refuses the coding. An unparsable quality is treated as refusal too.
fn accepts_coding_gzip(coding: &str) -> bool {
    let mut params = coding.split(';');
    if !params.next().is_some_and(|name| name.trim().eq_ignore_ascii_case("gzip")) {
        return false;
    }
    params
        .filter_map(|param| param.split_once('='))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
        .all(|(_, quality)| quality.trim().parse::<f32>().is_ok_and(|quality| quality > 0.0))
}
