//! Transport seam for MCP sessions
//!
//! The session layer knows nothing about where bytes come from: child
//! process stdio in production, an in-memory duplex pipe in tests. A
//! factory reconnects with the original parameters after transport
//! failures.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::info;

use ragweave_config::McpServerConfig;

use crate::error::{McpError, Result};

/// A connected byte transport
pub struct Transport {
    /// Server-to-client byte stream
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Client-to-server byte stream
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    /// Child process handle, when the transport is subprocess stdio
    pub child: Option<Child>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("child", &self.child.as_ref().map(Child::id))
            .finish_non_exhaustive()
    }
}

/// Connects transports; retains the parameters needed to reconnect
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Establish a fresh transport
    async fn connect(&self) -> Result<Transport>;
}

/// Spawns a child process and exposes its stdio as the transport
#[derive(Debug, Clone)]
pub struct StdioTransportFactory {
    config: McpServerConfig,
}

impl StdioTransportFactory {
    /// Create a factory from server launch parameters
    #[must_use]
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for StdioTransportFactory {
    async fn connect(&self) -> Result<Transport> {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| McpError::Transport {
            message: format!("failed to spawn '{}': {e}", self.config.command),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::Transport {
            message: "child stdin unavailable".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Transport {
            message: "child stdout unavailable".to_string(),
        })?;

        info!(
            command = %self.config.command,
            pid = child.id(),
            "spawned mcp server subprocess"
        );

        Ok(Transport {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }
}
