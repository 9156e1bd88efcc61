//! agent_message tool implementation.
//!
//! Delivers a control message and waits for the reply when one is expected.

use offcache_agent::Agent;
use offcache_core::{ControlMessage, Error, VersionReply};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::json_result;

/// Parameters for the agent_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentMessageParams {
    /// Message object tagged by `type`: CLEAN_CACHE, SKIP_WAITING or GET_VERSION.
    pub message: serde_json::Value,
}

/// Output from the agent_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentMessageOutput {
    /// Message type as understood by the agent (`UNKNOWN` when ignored).
    pub handled: String,
    /// Reply to GET_VERSION.
    pub reply: Option<VersionReply>,
    /// Lifecycle state after handling.
    pub state: String,
}

fn message_type(message: &ControlMessage) -> &'static str {
    match message {
        ControlMessage::CleanCache => "CLEAN_CACHE",
        ControlMessage::SkipWaiting => "SKIP_WAITING",
        ControlMessage::GetVersion => "GET_VERSION",
        ControlMessage::Unknown => "UNKNOWN",
    }
}

/// Implementation of the agent_message tool.
pub async fn message_impl(agent: &Agent, params: AgentMessageParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage::from_value(&params.message);
    let handled = message_type(&message).to_string();

    let reply = if message.expects_reply() {
        let (tx, rx) = oneshot::channel();
        agent.handle_message(message, Some(tx)).await?;
        Some(rx.await.map_err(|e| Error::InvalidState(format!("no reply: {e}")))?)
    } else {
        agent.handle_message(message, None).await?;
        None
    };

    let output = AgentMessageOutput { handled, reply, state: agent.state().await.to_string() };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{agent, output, started};
    use offcache_core::{Destination, RequestDescriptor, Response, ResponseKind};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_version_reply() {
        let (agent, _net) = started().await;
        let params = AgentMessageParams { message: json!({"type": "GET_VERSION"}) };

        let result = message_impl(&agent, params).await.unwrap();
        let out: AgentMessageOutput = output(&result);
        assert_eq!(out.handled, "GET_VERSION");
        assert_eq!(out.reply, Some(VersionReply { version: "site-v1".into() }));
        assert_eq!(out.state, "activated");
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_installed_agent() {
        let (agent, _net) = agent().await;
        agent.db().open_partition("site-static-v0").await.unwrap();
        agent.start().await.unwrap();

        let params = AgentMessageParams { message: json!({"type": "SKIP_WAITING"}) };
        let result = message_impl(&agent, params).await.unwrap();
        let out: AgentMessageOutput = output(&result);
        assert_eq!(out.state, "activated");
        assert!(out.reply.is_none());
        assert!(!agent.db().has_partition("site-static-v0").await.unwrap());
    }

    #[tokio::test]
    async fn test_clean_cache_trims_to_ceiling() {
        let (agent, _net) = started().await;
        let dynamic = agent.db().open_partition("site-dynamic-v1").await.unwrap();
        let origin = agent.config().origin_url().unwrap();
        for i in 0..55 {
            let url = origin.join(&format!("/posts/{i}")).unwrap();
            let request = RequestDescriptor::get(url, Destination::Other);
            dynamic.put(&request, Response::new(200, ResponseKind::Basic, format!("{i}"))).await.unwrap();
        }

        let params = AgentMessageParams { message: json!({"type": "CLEAN_CACHE"}) };
        let result = message_impl(&agent, params).await.unwrap();
        let out: AgentMessageOutput = output(&result);
        assert_eq!(out.handled, "CLEAN_CACHE");

        let keys = dynamic.keys().await.unwrap();
        assert_eq!(keys.len(), 50);
        assert_eq!(keys[0].url().path(), "/posts/5");
    }

    #[tokio::test]
    async fn test_unknown_message_ignored() {
        let (agent, _net) = started().await;
        for message in [json!({"type": "RELOAD"}), json!("SKIP_WAITING"), json!(42)] {
            let result = message_impl(&agent, AgentMessageParams { message }).await.unwrap();
            let out: AgentMessageOutput = output(&result);
            assert_eq!(out.handled, "UNKNOWN");
        }
    }
}
