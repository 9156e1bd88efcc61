//! Request descriptors used as cache keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::compute_cache_key;

/// What the requester expects the resource to be used as.
///
/// Only `Document` is a navigation; the policy treats it specially when the
/// network is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Style,
    Script,
    Image,
    Font,
    Manifest,
    #[default]
    Other,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Other => "other",
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self, Destination::Document)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Destination::Document),
            "style" => Ok(Destination::Style),
            "script" => Ok(Destination::Script),
            "image" => Ok(Destination::Image),
            "font" => Ok(Destination::Font),
            "manifest" => Ok(Destination::Manifest),
            "other" | "" => Ok(Destination::Other),
            other => Err(format!("unknown destination: {other}")),
        }
    }
}

/// Identifies a resource: method, URL, destination and request headers.
///
/// Immutable once built. Two descriptors address the same cache entry when
/// their [`cache_key`](Self::cache_key) matches: method and URL without the
/// fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    method: String,
    url: Url,
    destination: Destination,
    headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    /// Build a descriptor. The method is normalized to upper case.
    pub fn new(method: &str, url: Url, destination: Destination) -> Self {
        Self { method: method.to_ascii_uppercase(), url, destination, headers: Vec::new() }
    }

    /// Shorthand for a GET request.
    pub fn get(url: Url, destination: Destination) -> Self {
        Self::new("GET", url, destination)
    }

    /// Return a copy with an extra request header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// URL with the fragment stripped, as used for matching.
    pub fn match_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }

    /// Content-addressed key for this request.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, &self.match_url())
    }
}
