//! Responses served to callers and stored in partitions.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Response category, as seen by the agent.
///
/// Only `Basic` responses are eligible for runtime caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response whose body is readable.
    Cors,
    /// Cross-origin response whose body is hidden.
    Opaque,
    /// Redirect that was not followed.
    OpaqueRedirect,
    /// Network error placeholder.
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::OpaqueRedirect => "opaqueredirect",
            ResponseKind::Error => "error",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseKind::Basic),
            "cors" => Ok(ResponseKind::Cors),
            "opaque" => Ok(ResponseKind::Opaque),
            "opaqueredirect" => Ok(ResponseKind::OpaqueRedirect),
            "error" => Ok(ResponseKind::Error),
            other => Err(format!("unknown response kind: {other}")),
        }
    }
}

/// An HTTP response owned by exactly one consumer.
///
/// `Response` is deliberately not `Clone`: storing it in a partition moves it,
/// so a response that must also reach the caller has to be copied first with
/// [`duplicate`](Self::duplicate).
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    kind: ResponseKind,
    redirected: bool,
    body: Bytes,
}

impl Response {
    pub fn new(status: u16, kind: ResponseKind, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), kind, redirected: false, body: body.into() }
    }

    /// Return the response with an extra header; names are stored lower-case.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_redirected(mut self, redirected: bool) -> Self {
        self.redirected = redirected;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn redirected(&self) -> bool {
        self.redirected
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response, yielding its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Status in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Eligible for runtime caching: exactly 200 and basic.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }

    /// Independent copy for a second consumer (typically the cache).
    pub fn duplicate(&self) -> Self {
        Self {
            status: self.status,
            headers: self.headers.clone(),
            kind: self.kind,
            redirected: self.redirected,
            body: Bytes::copy_from_slice(&self.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_cacheable() {
        assert!(Response::new(200, ResponseKind::Basic, "ok").is_cacheable());
        assert!(!Response::new(200, ResponseKind::Cors, "ok").is_cacheable());
        assert!(!Response::new(200, ResponseKind::Opaque, "").is_cacheable());
        assert!(!Response::new(206, ResponseKind::Basic, "partial").is_cacheable());
        assert!(!Response::new(404, ResponseKind::Basic, "missing").is_cacheable());
    }

    #[test]
    fn test_is_ok_range() {
        assert!(Response::new(204, ResponseKind::Basic, "").is_ok());
        assert!(!Response::new(304, ResponseKind::Basic, "").is_ok());
    }

    #[test]
    fn test_duplicate_is_independent() {
        let original = Response::new(200, ResponseKind::Basic, "<html></html>").with_header("Content-Type", "text/html");
        let copy = original.duplicate();
        assert_eq!(copy, original);
        assert_ne!(copy.body().as_ptr(), original.body().as_ptr());

        let consumed = copy.into_body();
        assert_eq!(&consumed[..], b"<html></html>");
        assert_eq!(original.content_type(), Some("text/html"));
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [ResponseKind::Basic, ResponseKind::Cors, ResponseKind::Opaque, ResponseKind::OpaqueRedirect] {
            assert_eq!(kind.as_str().parse::<ResponseKind>().unwrap(), kind);
        }
    }
}
