//! cache_partitions tool implementation.

use offcache_agent::Agent;
use offcache_core::PartitionStats;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output from the cache_partitions tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePartitionsOutput {
    /// Version tag reported to GET_VERSION.
    pub version: String,
    /// Lifecycle state.
    pub state: String,
    /// Whether fetches are being intercepted.
    pub controlling: bool,
    /// Partitions in creation order.
    pub partitions: Vec<PartitionStats>,
}

/// Implementation of the cache_partitions tool.
pub async fn partitions_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let output = CachePartitionsOutput {
        version: agent.config().version_tag(),
        state: agent.state().await.to_string(),
        controlling: agent.lifecycle().is_controlling(),
        partitions: agent.partitions().await?,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{agent, output, started};

    #[tokio::test]
    async fn test_partitions_before_install() {
        let (agent, _net) = agent().await;
        let result = partitions_impl(&agent).await.unwrap();
        let out: CachePartitionsOutput = output(&result);
        assert_eq!(out.state, "new");
        assert!(!out.controlling);
        assert!(out.partitions.is_empty());
    }

    #[tokio::test]
    async fn test_partitions_after_start() {
        let (agent, _net) = started().await;
        let result = partitions_impl(&agent).await.unwrap();
        let out: CachePartitionsOutput = output(&result);

        assert_eq!(out.version, "site-v1");
        assert_eq!(out.state, "activated");
        assert!(out.controlling);
        assert_eq!(
            out.partitions,
            vec![
                PartitionStats { name: "site-static-v1".into(), entries: 2 },
                PartitionStats { name: "site-dynamic-v1".into(), entries: 0 },
            ]
        );
    }
}
