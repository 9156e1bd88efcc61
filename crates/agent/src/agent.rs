//! The agent: one version of the caching worker and its event handlers.
//!
//! Hosts deliver events by calling the async handlers and awaiting them:
//! [`Agent::install`], [`Agent::activate`], [`Agent::handle_fetch`] and
//! [`Agent::handle_message`]. Awaiting a handler to completion is what keeps
//! the event alive.

use std::sync::Arc;

use offcache_core::{AgentConfig, CacheDb, Error, PartitionStats, RequestDescriptor, Response};

use crate::classify::{BypassReason, Eligibility, RequestClassifier};
use crate::fetch::Network;
use crate::lifecycle::{LifecycleController, LifecycleState};
use crate::policy::{FetchPolicy, Intercepted};

/// Result of the fetch event.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Left to default network handling.
    Bypassed(BypassReason),
    /// Answered by the policy.
    Intercepted(Intercepted),
}

/// A caching agent bound to one configuration, store and network.
pub struct Agent {
    config: Arc<AgentConfig>,
    db: CacheDb,
    network: Arc<dyn Network>,
    classifier: RequestClassifier,
    policy: FetchPolicy,
    lifecycle: LifecycleController,
}

impl Agent {
    pub fn new(config: AgentConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let classifier = RequestClassifier::new(&config)?;
        let policy = FetchPolicy::new(&config, db.clone(), Arc::clone(&network))?;
        let lifecycle = LifecycleController::new(&config, db.clone(), Arc::clone(&network))?;
        Ok(Self { config: Arc::new(config), db, network, classifier, policy, lifecycle })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Install event: prime the static partition.
    ///
    /// Activates straight away when skip-waiting was requested beforehand or
    /// `auto_skip_waiting` is set.
    pub async fn install(&self) -> Result<usize, Error> {
        let count = self.lifecycle.install().await?;
        if self.lifecycle.skip_waiting_requested() {
            self.lifecycle.activate().await?;
        }
        Ok(count)
    }

    /// Activate event: drop stale partitions and claim clients.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.lifecycle.activate().await
    }

    /// Leave the stand-by period, activating now if installed.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        if self.lifecycle.request_skip_waiting().await {
            self.lifecycle.activate().await?;
        }
        Ok(())
    }

    /// Bring the agent up at host startup.
    ///
    /// A complete static partition left by an earlier run of this version is
    /// reused without touching the network; otherwise the agent installs.
    /// It then activates unless a previous version's partitions are still
    /// around (those wait for `SKIP_WAITING`).
    pub async fn start(&self) -> Result<LifecycleState, Error> {
        let superseding = self.lifecycle.has_previous_version().await.unwrap_or_else(|e| {
            tracing::warn!("could not inspect partitions: {}", e);
            false
        });

        let resumed = self.lifecycle.resume().await.unwrap_or_else(|e| {
            tracing::warn!("could not inspect {}: {}", self.config.static_cache_name(), e);
            false
        });
        if !resumed {
            self.install().await?;
        }

        if self.state().await == LifecycleState::Installed {
            if superseding && !self.lifecycle.skip_waiting_requested() {
                tracing::info!("previous version present, waiting for SKIP_WAITING");
            } else {
                self.activate().await?;
            }
        }

        Ok(self.state().await)
    }

    /// Fetch event: classify, then run the policy for eligible requests.
    pub async fn handle_fetch(&self, request: &RequestDescriptor) -> Result<FetchOutcome, Error> {
        if !self.lifecycle.is_controlling() {
            return Ok(FetchOutcome::Bypassed(BypassReason::NotControlling));
        }

        match self.classifier.classify(request) {
            Eligibility::Bypass(reason) => {
                tracing::debug!("bypassing {} ({})", request.url(), reason);
                Ok(FetchOutcome::Bypassed(reason))
            }
            Eligibility::Intercept => self.policy.respond(request).await.map(FetchOutcome::Intercepted),
        }
    }

    /// Default network handling for a bypassed request. Nothing is cached.
    pub async fn passthrough(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        self.network.fetch(request).await
    }

    /// Partition names and entry counts.
    pub async fn partitions(&self) -> Result<Vec<PartitionStats>, Error> {
        self.db.partition_stats().await
    }
}
