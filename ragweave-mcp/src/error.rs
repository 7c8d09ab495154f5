//! MCP error classification

use thiserror::Error;

use ragweave_core::error::RagError;

/// Result alias for MCP operations
pub type Result<T> = std::result::Result<T, McpError>;

/// Errors raised by the multiplexer and its sessions
#[derive(Debug, Error)]
pub enum McpError {
    #[error("server '{server}' is not connected")]
    NotConnected { server: String },

    #[error("tool '{tool}' is not exposed by server '{server}'")]
    UnknownTool { server: String, tool: String },

    #[error("tool execution failed: {message}")]
    ToolExecution { message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("call deadline exceeded: {message}")]
    Timeout { message: String },

    #[error("call cancelled: {message}")]
    Cancelled { message: String },
}

impl McpError {
    /// Whether the session should be torn down and respawned
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::NotConnected { .. })
    }
}

impl From<McpError> for RagError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::NotConnected { server } => {
                Self::transport(format!("mcp server '{server}' is not connected"))
            }
            McpError::UnknownTool { server, tool } => {
                Self::not_found(format!("tool '{tool}' on server '{server}'"))
            }
            McpError::ToolExecution { message } => Self::tool_execution(message),
            McpError::Transport { message } => Self::transport(message),
            McpError::Timeout { message } => Self::timeout(message),
            McpError::Cancelled { message } => Self::cancelled(message),
        }
    }
}
