//! Install and activate transitions.
//!
//! `New -> Installing -> Installed -> Activating -> Activated`, with
//! `Redundant` when priming fails. Requests are only intercepted once the
//! controller is activated and has claimed clients.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::try_join_all;
use offcache_core::{AgentConfig, CacheDb, Destination, Error, RequestDescriptor};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::fetch::{Network, resolve};

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    New,
    Installing,
    /// Installed and waiting out the stand-by period.
    Installed,
    Activating,
    Activated,
    /// Install failed; this version will never control clients.
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::New => "new",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives install and activate for one agent version.
pub struct LifecycleController {
    db: CacheDb,
    network: Arc<dyn Network>,
    origin: Url,
    static_files: Vec<String>,
    static_cache: String,
    dynamic_cache: String,
    state: RwLock<LifecycleState>,
    activation: Mutex<()>,
    skip_waiting: AtomicBool,
    controlling: AtomicBool,
}

impl LifecycleController {
    pub fn new(config: &AgentConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            db,
            network,
            origin,
            static_files: config.static_files.clone(),
            static_cache: config.static_cache_name(),
            dynamic_cache: config.dynamic_cache_name(),
            state: RwLock::new(LifecycleState::New),
            activation: Mutex::new(()),
            skip_waiting: AtomicBool::new(config.auto_skip_waiting),
            controlling: AtomicBool::new(false),
        })
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// Whether fetches should be intercepted.
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::Acquire)
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }

    /// Record the skip-wait signal.
    ///
    /// Returns true when the controller is installed and should activate now.
    pub async fn request_skip_waiting(&self) -> bool {
        self.skip_waiting.store(true, Ordering::Release);
        self.state().await == LifecycleState::Installed
    }

    /// Current partition names: static first, dynamic second.
    pub fn current_partitions(&self) -> [&str; 2] {
        [&self.static_cache, &self.dynamic_cache]
    }

    /// Whether the store holds partitions that belong to another version.
    pub async fn has_previous_version(&self) -> Result<bool, Error> {
        let current = self.current_partitions();
        let names = self.db.list_partitions().await?;
        Ok(names.iter().any(|name| !current.contains(&name.as_str())))
    }

    /// Prime the static partition with every manifest entry.
    ///
    /// All or nothing: every entry is fetched first, and only when all of
    /// them succeed with a 2xx status is the batch written.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` if install already ran, `Error::Precache` if an
    /// entry fails to fetch, or a storage error if the batch write fails.
    pub async fn install(&self) -> Result<usize, Error> {
        {
            let mut state = self.state.write().await;
            if !matches!(*state, LifecycleState::New | LifecycleState::Redundant) {
                return Err(Error::InvalidState(format!("cannot install from {}", *state)));
            }
            *state = LifecycleState::Installing;
        }
        tracing::info!("installing, priming {}", self.static_cache);

        match self.prime().await {
            Ok(count) => {
                *self.state.write().await = LifecycleState::Installed;
                tracing::info!("installed: {} static files cached in {}", count, self.static_cache);
                Ok(count)
            }
            Err(e) => {
                *self.state.write().await = LifecycleState::Redundant;
                tracing::error!("failed to cache static files: {}", e);
                Err(e)
            }
        }
    }

    /// Skip priming when this version's static partition already holds every
    /// manifest entry, as left by an earlier run of the same version.
    ///
    /// Moves `New -> Installed` and returns true on success. Returns false,
    /// leaving the state alone, when anything is missing.
    pub async fn resume(&self) -> Result<bool, Error> {
        let mut state = self.state.write().await;
        if *state != LifecycleState::New || !self.db.has_partition(&self.static_cache).await? {
            return Ok(false);
        }

        let partition = self.db.open_partition(&self.static_cache).await?;
        for request in self.manifest_requests()? {
            if partition.lookup(&request).await?.is_none() {
                tracing::debug!("{} missing from {}, install needed", request.url(), self.static_cache);
                return Ok(false);
            }
        }

        *state = LifecycleState::Installed;
        tracing::info!("resumed: {} already holds every static file", self.static_cache);
        Ok(true)
    }

    fn manifest_requests(&self) -> Result<Vec<RequestDescriptor>, Error> {
        self.static_files
            .iter()
            .map(|entry| {
                resolve(&self.origin, entry)
                    .map(|url| RequestDescriptor::get(url, Destination::Other))
                    .map_err(|e| Error::Precache { url: entry.clone(), reason: e.to_string() })
            })
            .collect()
    }

    async fn prime(&self) -> Result<usize, Error> {
        let partition = self.db.open_partition(&self.static_cache).await?;
        let requests = self.manifest_requests()?;

        let entries = try_join_all(requests.into_iter().map(|request| async move {
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::Precache { url: request.url().to_string(), reason: e.to_string() })?;
            if !response.is_ok() {
                return Err(Error::Precache {
                    url: request.url().to_string(),
                    reason: format!("status {}", response.status()),
                });
            }
            Ok((request, response))
        }))
        .await?;

        let count = entries.len();
        partition.put_all(entries).await?;
        Ok(count)
    }

    /// Delete partitions from other versions and claim clients.
    ///
    /// Valid from `Installed`, and again from `Activated` (re-running it is
    /// harmless and leaves exactly the two current partitions). Concurrent
    /// calls run one after the other.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` from any other state; storage errors if the
    /// cleanup fails, in which case the previous state is restored.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let _activation = self.activation.lock().await;
        let previous = {
            let mut state = self.state.write().await;
            if !matches!(*state, LifecycleState::Installed | LifecycleState::Activated) {
                return Err(Error::InvalidState(format!("cannot activate from {}", *state)));
            }
            std::mem::replace(&mut *state, LifecycleState::Activating)
        };
        tracing::info!("activating");

        match self.remove_stale_partitions().await {
            Ok(deleted) => {
                self.controlling.store(true, Ordering::Release);
                *self.state.write().await = LifecycleState::Activated;
                tracing::info!("activated, controlling clients");
                Ok(deleted)
            }
            Err(e) => {
                *self.state.write().await = previous;
                tracing::error!("activation failed: {}", e);
                Err(e)
            }
        }
    }

    async fn remove_stale_partitions(&self) -> Result<Vec<String>, Error> {
        let current = self.current_partitions();
        let stale: Vec<String> = self
            .db
            .list_partitions()
            .await?
            .into_iter()
            .filter(|name| !current.contains(&name.as_str()))
            .collect();

        try_join_all(stale.iter().map(|name| async move {
            tracing::info!("deleting old cache {}", name);
            self.db.delete_partition(name).await
        }))
        .await?;

        for name in current {
            self.db.open_partition(name).await?;
        }

        Ok(stale)
    }
}
