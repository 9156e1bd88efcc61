//! Request classification: which requests the agent intercepts at all.
//!
//! Checks run in order and the first failing one decides the bypass reason:
//! method, exclusion list, then origin (with the two font hosts allowed).

use std::fmt;

use offcache_core::{AgentConfig, Error, RequestDescriptor};
use url::Url;

use crate::fetch::same_origin;

/// Why a request is left to default network handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassReason {
    /// Not a GET.
    Method(String),
    /// URL contains an excluded pattern.
    Excluded(String),
    /// Different origin and not an allow-listed host.
    CrossOrigin,
    /// The agent is not (yet) controlling clients.
    NotControlling,
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BypassReason::Method(method) => write!(f, "method {method}"),
            BypassReason::Excluded(pattern) => write!(f, "excluded by {pattern}"),
            BypassReason::CrossOrigin => f.write_str("cross-origin"),
            BypassReason::NotControlling => f.write_str("not controlling"),
        }
    }
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Intercept,
    Bypass(BypassReason),
}

impl Eligibility {
    pub fn is_intercepted(&self) -> bool {
        matches!(self, Eligibility::Intercept)
    }
}

/// Decides per request whether the fetch policy sees it.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    origin: Url,
    excluded_urls: Vec<String>,
    allowed_hosts: [String; 2],
}

impl RequestClassifier {
    pub fn new(config: &AgentConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            excluded_urls: config.excluded_urls.clone(),
            allowed_hosts: [config.font_stylesheet_host.clone(), config.font_asset_host.clone()],
        })
    }

    pub fn classify(&self, request: &RequestDescriptor) -> Eligibility {
        if !request.is_get() {
            return Eligibility::Bypass(BypassReason::Method(request.method().to_string()));
        }

        let url = request.url().as_str();
        if let Some(pattern) = self.excluded_urls.iter().find(|p| url.contains(p.as_str())) {
            return Eligibility::Bypass(BypassReason::Excluded(pattern.clone()));
        }

        if !same_origin(request.url(), &self.origin)
            && !request.url().host_str().is_some_and(|host| self.is_allowed_host(host))
        {
            return Eligibility::Bypass(BypassReason::CrossOrigin);
        }

        Eligibility::Intercept
    }

    /// Whether a host matches either allow-listed host pattern.
    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|pattern| !pattern.is_empty() && host.contains(pattern.as_str()))
    }
}
