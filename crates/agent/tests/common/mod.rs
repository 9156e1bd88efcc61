//! Shared fixtures for agent integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use offcache_agent::{Agent, Network};
use offcache_core::{AgentConfig, CacheDb, Destination, Error, RequestDescriptor, Response, ResponseKind};
use url::Url;

pub const ORIGIN: &str = "https://example.com";

/// Network double answering from a fixed routing table.
///
/// Unknown URLs answer 404. While offline every fetch fails.
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, (u16, ResponseKind, String)>>,
    online: AtomicBool,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Network serving the site's manifest files.
    pub fn site() -> Arc<Self> {
        let net = Self::new();
        net.route("/", 200, ResponseKind::Basic, "<html>root</html>");
        net.route("/index.html", 200, ResponseKind::Basic, "<html>index</html>");
        net.route("/styles.css", 200, ResponseKind::Basic, "body { margin: 0 }");
        net
    }

    pub fn route(&self, url: &str, status: u16, kind: ResponseKind, body: &str) {
        let url = Url::parse(ORIGIN).unwrap().join(url).unwrap().to_string();
        self.routes.lock().unwrap().insert(url, (status, kind, body.to_string()));
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, url: &str) -> usize {
        let url = Url::parse(ORIGIN).unwrap().join(url).unwrap().to_string();
        self.log.lock().unwrap().iter().filter(|u| **u == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.match_url();
        self.log.lock().unwrap().push(url.clone());

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }

        let route = self.routes.lock().unwrap().get(&url).cloned();
        Ok(match route {
            Some((status, kind, body)) => Response::new(status, kind, body).with_header("content-type", "text/plain"),
            None => Response::new(404, ResponseKind::Basic, "not found"),
        })
    }
}

pub fn site_config() -> AgentConfig {
    AgentConfig {
        origin: ORIGIN.into(),
        static_files: vec!["/".into(), "/index.html".into(), "/styles.css".into()],
        ..Default::default()
    }
}

pub async fn agent_with(config: AgentConfig, net: Arc<ScriptedNetwork>) -> Agent {
    let db = CacheDb::open_in_memory().await.unwrap();
    Agent::new(config, db, net).unwrap()
}

/// Installed and activated agent over the site network.
pub async fn active_agent(net: Arc<ScriptedNetwork>) -> Agent {
    let agent = agent_with(site_config(), net).await;
    agent.install().await.unwrap();
    agent.activate().await.unwrap();
    agent
}

pub fn get(path: &str, destination: Destination) -> RequestDescriptor {
    RequestDescriptor::get(Url::parse(ORIGIN).unwrap().join(path).unwrap(), destination)
}

pub fn get_abs(url: &str, destination: Destination) -> RequestDescriptor {
    RequestDescriptor::get(Url::parse(url).unwrap(), destination)
}
