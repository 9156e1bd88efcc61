//! Configuration validation rules.
//!
//! This module provides validation logic for `AgentConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AgentConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AgentConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL with a host
    /// - `cache_prefix`, `version` or `user_agent` is empty
    /// - `dynamic_max_entries` is 0
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `fallback_document` is not origin-relative
    /// - a `static_files` entry cannot be resolved against the origin
    ///
    /// Returns `ConfigError::Missing` if `static_files` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "scheme must be http or https".into() });
        }
        if origin.host_str().is_none() {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must include a host".into() });
        }

        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }
        if self.version.is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }

        if self.dynamic_max_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "dynamic_max_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.fallback_document.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "fallback_document".into(),
                reason: "must be an origin-relative path".into(),
            });
        }

        if self.static_files.is_empty() {
            return Err(ConfigError::Missing {
                field: "static_files".into(),
                hint: "list at least the root document in OFFCACHE_STATIC_FILES".into(),
            });
        }
        for entry in &self.static_files {
            origin.join(entry).map_err(|e| ConfigError::Invalid {
                field: "static_files".into(),
                reason: format!("{entry}: {e}"),
            })?;
        }

        if self.static_files.iter().all(|entry| entry != &self.fallback_document) {
            tracing::warn!(
                fallback = %self.fallback_document,
                "fallback document is not in the static manifest; offline navigations may fail"
            );
        }

        Ok(())
    }
}
