//! MCP server configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use ragweave_core::error::{RagError, Result};

/// Launch parameters for one MCP server subprocess
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Executable to spawn
    pub command: String,
    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// MCP subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Server name → launch parameters
    pub servers: HashMap<String, McpServerConfig>,
    /// Default per-call deadline in milliseconds
    pub call_timeout_ms: u64,
    /// Handshake deadline in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers: HashMap::new(),
            call_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl McpConfig {
    /// Validate field ranges and server specs
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on empty commands or zero deadlines.
    pub fn validate(&self) -> Result<()> {
        if self.call_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(RagError::invalid_argument("mcp timeouts must be positive"));
        }
        for (name, server) in &self.servers {
            if name.is_empty() {
                return Err(RagError::invalid_argument("mcp server name must be non-empty"));
            }
            if server.command.is_empty() {
                return Err(RagError::invalid_argument(format!(
                    "mcp server '{name}' has an empty command"
                )));
            }
        }
        Ok(())
    }
}
