//! Agent configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFCACHE_*)
//! 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded [`AgentConfig`] is immutable and shared by every component of
//! the agent; cache names, the static manifest and the exclusion list all
//! live here rather than in process-wide state.

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Agent configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFCACHE_*)
/// 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Origin of the site the agent serves (scheme, host and optional port).
    ///
    /// Set via OFFCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by every partition name.
    ///
    /// Set via OFFCACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag baked into partition names.
    ///
    /// Bumping it orphans the previous partitions, which activation deletes.
    #[serde(default = "default_version")]
    pub version: String,

    /// Static manifest: URLs primed into the static partition at install.
    ///
    /// Entries may be absolute or relative to `origin`.
    #[serde(default = "default_static_files")]
    pub static_files: Vec<String>,

    /// URL substrings that are never intercepted.
    #[serde(default = "default_excluded_urls")]
    pub excluded_urls: Vec<String>,

    /// Cross-origin host pattern for font stylesheets.
    #[serde(default = "default_font_stylesheet_host")]
    pub font_stylesheet_host: String,

    /// Cross-origin host pattern for font files.
    #[serde(default = "default_font_asset_host")]
    pub font_asset_host: String,

    /// Document served to navigations when the network is unavailable.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// Ceiling applied to the dynamic partition by the trim signal.
    #[serde(default = "default_dynamic_max_entries")]
    pub dynamic_max_entries: usize,

    /// Skip the stand-by period as soon as install succeeds.
    #[serde(default)]
    pub auto_skip_waiting: bool,

    /// Path to the SQLite cache database.
    ///
    /// Set via OFFCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum number of redirects followed by the network client.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_prefix() -> String {
    "site".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_static_files() -> Vec<String> {
    vec!["/".into(), "/index.html".into()]
}

fn default_excluded_urls() -> Vec<String> {
    ["/sw.js", "/manifest.json", "chrome-extension://", "moz-extension://", "safari-extension://"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_font_stylesheet_host() -> String {
    "fonts.googleapis.com".into()
}

fn default_font_asset_host() -> String {
    "fonts.gstatic.com".into()
}

fn default_fallback_document() -> String {
    "/index.html".into()
}

fn default_dynamic_max_entries() -> usize {
    50
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcache.sqlite")
}

fn default_user_agent() -> String {
    "offcache/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            static_files: default_static_files(),
            excluded_urls: default_excluded_urls(),
            font_stylesheet_host: default_font_stylesheet_host(),
            font_asset_host: default_font_asset_host(),
            fallback_document: default_fallback_document(),
            dynamic_max_entries: default_dynamic_max_entries(),
            auto_skip_waiting: false,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFCACHE_`
    /// 2. TOML file from `OFFCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Name of the partition primed at install.
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.version)
    }

    /// Name of the partition filled at runtime.
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-dynamic-{}", self.cache_prefix, self.version)
    }

    /// Version identifier reported to `GET_VERSION`.
    pub fn version_tag(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Parsed site origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// The two cross-origin host patterns allowed through the classifier.
    pub fn font_hosts(&self) -> [&str; 2] {
        [self.font_stylesheet_host.as_str(), self.font_asset_host.as_str()]
    }
}
