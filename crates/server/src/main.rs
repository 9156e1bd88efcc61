//! offcache server entry point.
//!
//! Boots the caching agent, then serves it over MCP on stdio. Logging goes to
//! stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offcache_agent::{Agent, FetchClient, FetchConfig};
use offcache_core::{AgentConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AgentConfig::load()?;
    tracing::info!(origin = %config.origin, version = %config.version_tag(), "starting offcache on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_agent_config(&config)?)?);
    let agent = Arc::new(Agent::new(config, db, network)?);

    match agent.start().await {
        Ok(state) => tracing::info!(%state, "agent started"),
        Err(e) => tracing::error!("agent failed to start: {}", e),
    }

    let db = agent.db().clone();
    let handler = handler::OffcacheServer::new(agent);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    if let Err(e) = db.close().await {
        tracing::warn!("failed to close cache store: {}", e);
    }

    Ok(())
}
