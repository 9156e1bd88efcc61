//! agent_fetch tool implementation.
//!
//! Runs the fetch event for one request. Requests the agent leaves alone are
//! sent straight to the network, as a browser would without a worker.

use offcache_agent::{Agent, FetchOutcome, fetch::resolve};
use offcache_core::{Destination, Error, RequestDescriptor, Response};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchParams {
    /// Absolute URL, or a path relative to the site origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination: document, style, script, image, font, manifest or other.
    #[serde(default)]
    pub destination: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// `cache`, `network`, `fallback` or `bypass`.
    pub source: String,
    /// Why the agent left the request alone.
    pub bypass_reason: Option<String>,
    /// Partition the response is being written to.
    pub stored_in: Option<String>,
    pub status: u16,
    /// Response kind: basic, cors, opaque, opaqueredirect or error.
    pub kind: String,
    pub redirected: bool,
    pub content_type: Option<String>,
    /// Body as text (lossy UTF-8).
    pub body: String,
    pub body_bytes: usize,
}

impl AgentFetchOutput {
    fn new(url: String, source: &str, response: Response) -> Self {
        let content_type = response.content_type().map(str::to_string);
        let status = response.status();
        let kind = response.kind().to_string();
        let redirected = response.redirected();
        let body = response.into_body();

        Self {
            url,
            source: source.to_string(),
            bypass_reason: None,
            stored_in: None,
            status,
            kind,
            redirected,
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
            body_bytes: body.len(),
        }
    }
}

/// Implementation of the agent_fetch tool.
pub async fn fetch_impl(agent: &Agent, params: AgentFetchParams) -> Result<CallToolResult, McpError> {
    let origin = agent.config().origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let url = resolve(&origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let destination: Destination = params
        .destination
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(Error::InvalidInput)?;
    let request = RequestDescriptor::new(&params.method, url, destination);

    let output = match agent.handle_fetch(&request).await? {
        FetchOutcome::Intercepted(intercepted) => {
            let mut output =
                AgentFetchOutput::new(request.url().to_string(), intercepted.source.as_str(), intercepted.response);
            output.stored_in = intercepted.stored_in;
            output
        }
        FetchOutcome::Bypassed(reason) => {
            let response = agent.passthrough(&request).await?;
            let mut output = AgentFetchOutput::new(request.url().to_string(), "bypass", response);
            output.bypass_reason = Some(reason.to_string());
            output
        }
    };

    json_result(&output)
}
