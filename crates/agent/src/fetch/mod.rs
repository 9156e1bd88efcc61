//! Network access for the agent.
//!
//! The agent talks to the network only through the [`Network`] trait. The
//! default implementation, [`FetchClient`], is a reqwest client that:
//!
//! - forwards the request method and headers
//! - follows up to `max_redirects` redirects
//! - enforces a body size limit
//! - classifies the response: a final URL on the site origin is `basic`,
//!   anything else is `cors`
//!
//! Non-2xx statuses are returned as responses, not errors; only transport
//! failures surface as [`Error::Network`]. No request timeout is applied.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use std::time::Instant;

pub use self::url::{UrlError, resolve, same_origin};

use offcache_core::{AgentConfig, Error, RequestDescriptor, Response, ResponseKind};

/// Transport used by the agent for every network request.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. Transport failures map to `Error::Network`.
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Site origin; responses whose final URL is on it are `basic`.
    pub origin: Url,

    /// User agent string (default: "offcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    /// Derive the client configuration from the agent configuration.
    pub fn from_agent_config(config: &AgentConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            max_redirects: config.max_redirects,
        })
    }
}

/// HTTP client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn response_kind(&self, final_url: &Url) -> ResponseKind {
        if same_origin(final_url, &self.config.origin) { ResponseKind::Basic } else { ResponseKind::Cors }
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method(), e)))?;
        let requested = request.match_url();

        let mut builder = self.http.request(method, requested.as_str());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("network error: {}", e)))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::Network(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::Network(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let kind = self.response_kind(&final_url);
        let redirected = final_url.as_str() != requested;

        tracing::debug!(
            "fetched {} -> {} {} ({}, {} bytes) in {}ms",
            requested,
            final_url,
            status.as_u16(),
            kind,
            bytes.len(),
            start.elapsed().as_millis()
        );

        Ok(Response::new(status.as_u16(), kind, bytes)
            .with_headers(headers)
            .with_redirected(redirected))
    }
}
