//! Control messages delivered to the agent out of band.
//!
//! Messages are JSON objects tagged by `type`. Unknown types, and payloads
//! that are not tagged objects at all, decode to [`ControlMessage::Unknown`]
//! and are ignored by the agent.

use serde::{Deserialize, Serialize};

/// A control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Trim the dynamic partition down to its ceiling.
    #[serde(rename = "CLEAN_CACHE")]
    CleanCache,

    /// Leave the stand-by period and activate now.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,

    /// Ask for the current version; answered over the reply channel.
    #[serde(rename = "GET_VERSION")]
    GetVersion,

    #[serde(other, rename = "UNKNOWN")]
    Unknown,
}

impl ControlMessage {
    /// Decode a message, treating anything unrecognized as `Unknown`.
    pub fn from_value(value: &serde_json::Value) -> Self {
        ControlMessage::deserialize(value).unwrap_or(ControlMessage::Unknown)
    }

    /// Whether the sender expects a reply.
    pub fn expects_reply(&self) -> bool {
        matches!(self, ControlMessage::GetVersion)
    }
}

/// Reply to [`ControlMessage::GetVersion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VersionReply {
    pub version: String,
}
