//! MCP tool implementations.
//!
//! Each tool drives one agent event and reports the outcome as pretty JSON.

pub mod agent_fetch;
pub mod agent_message;
pub mod cache_partitions;

pub use agent_fetch::{AgentFetchOutput, AgentFetchParams};
pub use agent_message::{AgentMessageOutput, AgentMessageParams};
pub use cache_partitions::CachePartitionsOutput;

use offcache_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Serialize a tool output into a successful result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use offcache_agent::{Agent, Network};
    use offcache_core::{AgentConfig, CacheDb, Error, RequestDescriptor, Response, ResponseKind};
    use rmcp::model::CallToolResult;

    /// Serves every URL with its own path as the body. Fails while offline.
    pub struct EchoNetwork {
        online: AtomicBool,
    }

    impl EchoNetwork {
        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Network for EchoNetwork {
        async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, Error> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            Ok(Response::new(200, ResponseKind::Basic, request.url().path().to_string())
                .with_header("content-type", "text/html"))
        }
    }

    pub fn config() -> AgentConfig {
        AgentConfig { origin: "https://example.com".into(), ..Default::default() }
    }

    /// Agent that has not run install yet.
    pub async fn agent() -> (Arc<Agent>, Arc<EchoNetwork>) {
        let net = Arc::new(EchoNetwork { online: AtomicBool::new(true) });
        let db = CacheDb::open_in_memory().await.unwrap();
        let agent = Agent::new(config(), db, Arc::clone(&net) as Arc<dyn Network>).unwrap();
        (Arc::new(agent), net)
    }

    /// Installed and controlling agent.
    pub async fn started() -> (Arc<Agent>, Arc<EchoNetwork>) {
        let (agent, net) = agent().await;
        agent.start().await.unwrap();
        (agent, net)
    }

    pub fn output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
