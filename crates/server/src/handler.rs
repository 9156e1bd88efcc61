//! MCP server handler implementation.
//!
//! Routes tool calls to the agent's event handlers.
use std::sync::Arc;

use offcache_agent::Agent;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::agent_fetch::{AgentFetchParams, fetch_impl};
use crate::tools::agent_message::{AgentMessageParams, message_impl};
use crate::tools::cache_partitions::partitions_impl;

/// The MCP server handler for offcache.
#[derive(Clone)]
pub struct OffcacheServer {
    agent: Arc<Agent>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OffcacheServer {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent, tool_router: Self::tool_router() }
    }

    /// Run a request through the agent's fetch event.
    #[tool(
        description = "Fetch a URL through the caching agent. Returns the response with its source: cache, network, fallback or bypass."
    )]
    async fn agent_fetch(&self, params: Parameters<AgentFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.agent, params.0).await
    }

    /// Deliver a control message to the agent.
    #[tool(description = "Send a control message (CLEAN_CACHE, SKIP_WAITING, GET_VERSION) to the agent.")]
    async fn agent_message(&self, params: Parameters<AgentMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.agent, params.0).await
    }

    #[tool(description = "List cache partitions with entry counts, plus the agent's version and lifecycle state.")]
    async fn cache_partitions(&self) -> Result<CallToolResult, McpError> {
        partitions_impl(&self.agent).await
    }
}

impl ServerHandler for OffcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::agent;

    #[tokio::test]
    async fn test_tools_registered() {
        let (agent, _net) = agent().await;
        let server = OffcacheServer::new(agent);
        let names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        for name in ["agent_fetch", "agent_message", "cache_partitions"] {
            assert!(names.iter().any(|n| n == name), "missing tool {name}");
        }
    }

    #[tokio::test]
    async fn test_server_info() {
        let (agent, _net) = agent().await;
        let info = OffcacheServer::new(agent).get_info();
        assert_eq!(info.server_info.name, "offcache");
    }
}
