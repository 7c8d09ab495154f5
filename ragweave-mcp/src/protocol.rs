//! Line-delimited JSON wire protocol
//!
//! Each outbound request carries a unique id; each response echoes it.
//! Messages without an id are notifications and never receive a reply.
//! Responses for one session are matched by id, not by order of issue.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol method names
pub mod methods {
    /// Session handshake
    pub const INITIALIZE: &str = "initialize";
    /// Tool discovery
    pub const LIST_TOOLS: &str = "list_tools";
    /// Tool invocation
    pub const CALL_TOOL: &str = "call_tool";
    /// Cancellation notice for an in-flight request
    pub const CANCEL: &str = "cancel";
}

/// Outbound request with correlation id
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    /// Correlation id echoed by the response
    pub id: u64,
    /// Method name
    pub method: &'a str,
    /// Free-form parameters
    pub params: Value,
}

/// Outbound notification (no id, no reply expected)
#[derive(Debug, Serialize)]
pub struct Notification<'a> {
    /// Method name
    pub method: &'a str,
    /// Free-form parameters
    pub params: Value,
}

/// Error object carried in a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    /// Optional numeric code
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable message
    pub message: String,
}

/// Any inbound line: response (has id) or notification (has method)
///
/// Unknown fields are ignored so servers may extend the protocol.
#[derive(Debug, Deserialize)]
pub struct Incoming {
    /// Correlation id, present on responses
    #[serde(default)]
    pub id: Option<u64>,
    /// Successful result payload
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload
    #[serde(default)]
    pub error: Option<WireError>,
    /// Method, present on notifications
    #[serde(default)]
    pub method: Option<String>,
    /// Notification parameters
    #[serde(default)]
    pub params: Option<Value>,
}

/// Tool descriptor returned by `list_tools`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON schema of the tool's arguments
    #[serde(default)]
    pub input_schema: Value,
}

impl ToolInfo {
    /// Create a descriptor with an empty schema
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Value::Null,
        }
    }
}
