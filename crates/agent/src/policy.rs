//! Cache-first fetch interception with network fallback.
//!
//! For an eligible request:
//!
//! 1. Look the request up across every partition. A hit is returned as is.
//! 2. On a miss, fetch from the network.
//! 3. Network failure: navigations get the cached fallback document, anything
//!    else gets the error.
//! 4. Network success: a 200 basic response is duplicated and the copy is
//!    written to the static or dynamic partition in a background task. The
//!    original goes back to the caller whatever the write does.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use offcache_core::{AgentConfig, CacheDb, Destination, Error, RequestDescriptor, Response};
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::{Network, resolve, same_origin};

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// The fallback document, served to a navigation while offline.
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response produced by the policy.
#[derive(Debug)]
pub struct Intercepted {
    pub response: Response,
    pub source: ResponseSource,
    /// Partition the response is being written to, if it was cacheable.
    pub stored_in: Option<String>,
    /// Background cache write. Dropping the handle does not cancel it.
    pub pending_write: Option<JoinHandle<()>>,
}

impl Intercepted {
    fn served(response: Response, source: ResponseSource) -> Self {
        Self { response, source, stored_in: None, pending_write: None }
    }

    /// Wait for the background cache write, if any.
    pub async fn settle(&mut self) {
        if let Some(handle) = self.pending_write.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("cache write task failed: {}", e);
        }
    }
}

/// The interception policy.
pub struct FetchPolicy {
    db: CacheDb,
    network: Arc<dyn Network>,
    origin: Url,
    static_paths: HashSet<String>,
    font_hosts: [String; 2],
    static_cache: String,
    dynamic_cache: String,
    fallback: RequestDescriptor,
}

impl FetchPolicy {
    pub fn new(config: &AgentConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut static_paths = HashSet::new();
        for entry in &config.static_files {
            let url = resolve(&origin, entry).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}")))?;
            if same_origin(&url, &origin) {
                static_paths.insert(url.path().to_string());
            }
        }

        let fallback_url = resolve(&origin, &config.fallback_document)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", config.fallback_document, e)))?;

        Ok(Self {
            db,
            network,
            origin,
            static_paths,
            font_hosts: [config.font_stylesheet_host.clone(), config.font_asset_host.clone()],
            static_cache: config.static_cache_name(),
            dynamic_cache: config.dynamic_cache_name(),
            fallback: RequestDescriptor::get(fallback_url, Destination::Document),
        })
    }

    /// Partition a cacheable response for this request is written to.
    ///
    /// Static when the path is a same-origin manifest path or the host is a
    /// font host; dynamic otherwise.
    pub fn partition_for(&self, request: &RequestDescriptor) -> &str {
        let url = request.url();
        let manifest_path = same_origin(url, &self.origin) && self.static_paths.contains(url.path());
        let font_host = url.host_str().is_some_and(|host| {
            self.font_hosts
                .iter()
                .any(|pattern| !pattern.is_empty() && host.contains(pattern.as_str()))
        });

        if manifest_path || font_host { &self.static_cache } else { &self.dynamic_cache }
    }

    /// Answer an eligible request.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` when the network fails and no fallback applies.
    /// Storage errors never surface here.
    pub async fn respond(&self, request: &RequestDescriptor) -> Result<Intercepted, Error> {
        match self.db.lookup_any(request).await {
            Ok(Some(cached)) => {
                tracing::debug!("cache hit for {}", request.url());
                return Ok(Intercepted::served(cached, ResponseSource::Cache));
            }
            Ok(None) => tracing::debug!("cache miss for {}", request.url()),
            Err(e) => tracing::warn!("cache lookup failed for {}, treating as miss: {}", request.url(), e),
        }

        let response = match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("fetch failed for {}: {}", request.url(), e);
                if request.destination().is_navigation()
                    && let Some(fallback) = self.fallback_document().await
                {
                    tracing::info!("serving {} offline for {}", self.fallback.url(), request.url());
                    return Ok(Intercepted::served(fallback, ResponseSource::Fallback));
                }
                return Err(e);
            }
        };

        if !response.is_cacheable() {
            tracing::debug!(
                "not caching {} (status {}, {})",
                request.url(),
                response.status(),
                response.kind()
            );
            return Ok(Intercepted::served(response, ResponseSource::Network));
        }

        let partition = self.partition_for(request).to_string();
        let pending = self.store_in_background(partition.clone(), request.clone(), response.duplicate());

        Ok(Intercepted {
            response,
            source: ResponseSource::Network,
            stored_in: Some(partition),
            pending_write: Some(pending),
        })
    }

    async fn fallback_document(&self) -> Option<Response> {
        match self.db.lookup_any(&self.fallback).await {
            Ok(found) => {
                if found.is_none() {
                    tracing::warn!("fallback document {} is not cached", self.fallback.url());
                }
                found
            }
            Err(e) => {
                tracing::warn!("fallback lookup failed: {}", e);
                None
            }
        }
    }

    fn store_in_background(&self, partition: String, request: RequestDescriptor, copy: Response) -> JoinHandle<()> {
        let db = self.db.clone();
        tokio::spawn(async move {
            let result = match db.open_partition(&partition).await {
                Ok(handle) => handle.put(&request, copy).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => tracing::debug!("cached {} in {}", request.url(), partition),
                Err(e) => tracing::warn!("failed to cache {} in {}: {}", request.url(), partition, e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use offcache_core::ResponseKind;

    struct Offline;

    #[async_trait]
    impl Network for Offline {
        async fn fetch(&self, _request: &RequestDescriptor) -> Result<Response, Error> {
            Err(Error::Network("offline".into()))
        }
    }

    /// Answers every request with a 200 basic response echoing its path.
    struct Online;

    #[async_trait]
    impl Network for Online {
        async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error> {
            Ok(Response::new(200, ResponseKind::Basic, request.url().path().to_string()))
        }
    }

    fn config() -> AgentConfig {
        AgentConfig {
            origin: "https://example.com".into(),
            static_files: vec![
                "/".into(),
                "/index.html".into(),
                "/Pictures/Logo Onin.png".into(),
                "https://cdn.example.net/index.html".into(),
            ],
            ..Default::default()
        }
    }

    async fn policy() -> FetchPolicy {
        let db = CacheDb::open_in_memory().await.unwrap();
        FetchPolicy::new(&config(), db, Arc::new(Offline)).unwrap()
    }

    /// Policy whose store has been closed, so every lookup and write fails.
    async fn broken_store(network: Arc<dyn Network>) -> FetchPolicy {
        let db = CacheDb::open_in_memory().await.unwrap();
        let policy = FetchPolicy::new(&config(), db.clone(), network).unwrap();
        db.close().await.unwrap();
        policy
    }

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor::get(Url::parse(url).unwrap(), Destination::Other)
    }

    #[tokio::test]
    async fn test_manifest_paths_go_to_static() {
        let p = policy().await;
        assert_eq!(p.partition_for(&get("https://example.com/")), "site-static-v1");
        assert_eq!(p.partition_for(&get("https://example.com/index.html?utm=1")), "site-static-v1");
        assert_eq!(p.partition_for(&get("https://example.com/Pictures/Logo%20Onin.png")), "site-static-v1");
    }

    #[tokio::test]
    async fn test_font_hosts_go_to_static() {
        let p = policy().await;
        assert_eq!(p.partition_for(&get("https://fonts.gstatic.com/s/inter.woff2")), "site-static-v1");
    }

    #[tokio::test]
    async fn test_everything_else_goes_to_dynamic() {
        let p = policy().await;
        assert_eq!(p.partition_for(&get("https://example.com/projects.html")), "site-dynamic-v1");
        assert_eq!(p.partition_for(&get("https://example.com/index.htm")), "site-dynamic-v1");
    }

    #[tokio::test]
    async fn test_static_paths_from_same_origin_entries_only() {
        let p = policy().await;
        let mut paths: Vec<&str> = p.static_paths.iter().map(String::as_str).collect();
        paths.sort();
        assert_eq!(paths, vec!["/", "/Pictures/Logo%20Onin.png", "/index.html"]);
    }

    #[tokio::test]
    async fn test_offline_non_navigation_propagates() {
        let p = policy().await;
        let result = p.respond(&get("https://example.com/app.js")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_offline_navigation_without_fallback_propagates() {
        let p = policy().await;
        let request = RequestDescriptor::get(Url::parse("https://example.com/about").unwrap(), Destination::Document);
        let result = p.respond(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_store_failures_do_not_fail_the_request() {
        let p = broken_store(Arc::new(Online)).await;

        let mut outcome = p.respond(&get("https://example.com/projects.html")).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);
        assert_eq!(outcome.stored_in.as_deref(), Some("site-dynamic-v1"));
        outcome.settle().await;
        assert!(outcome.pending_write.is_none());
        assert_eq!(&outcome.response.body()[..], b"/projects.html");
    }

    #[tokio::test]
    async fn test_offline_navigation_with_broken_store_propagates() {
        let p = broken_store(Arc::new(Offline)).await;
        let request = RequestDescriptor::get(Url::parse("https://example.com/about").unwrap(), Destination::Document);
        let result = p.respond(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
