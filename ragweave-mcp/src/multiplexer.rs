//! Session multiplexer across named MCP servers
//!
//! Sessions are created lazily on first use, shared per server name, and
//! respawned with the original launch parameters after a transport
//! failure. A failed call is retried exactly once after reconnection;
//! further retries are the caller's responsibility.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ragweave_config::{McpConfig, McpServerConfig};

use crate::error::{McpError, Result};
use crate::protocol::ToolInfo;
use crate::session::McpSession;
use crate::transport::{StdioTransportFactory, TransportFactory};

/// Thread-safe multiplexer over named tool servers
pub struct McpMultiplexer {
    factories: parking_lot::RwLock<HashMap<String, Arc<dyn TransportFactory>>>,
    sessions: DashMap<String, Arc<McpSession>>,
    connect_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    call_timeout: Duration,
    connect_timeout: Duration,
}

impl std::fmt::Debug for McpMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpMultiplexer")
            .field("servers", &self.factories.read().len())
            .field("connected", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl McpMultiplexer {
    /// Create a multiplexer with the given per-call and handshake deadlines
    #[must_use]
    pub fn new(call_timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            factories: parking_lot::RwLock::new(HashMap::new()),
            sessions: DashMap::new(),
            connect_locks: DashMap::new(),
            call_timeout,
            connect_timeout,
        }
    }

    /// Create a multiplexer and register every configured stdio server
    #[must_use]
    pub fn from_config(config: &McpConfig) -> Self {
        let mux = Self::new(
            Duration::from_millis(config.call_timeout_ms),
            Duration::from_millis(config.connect_timeout_ms),
        );
        for (name, server) in &config.servers {
            mux.register_stdio_server(name, server.clone());
        }
        mux
    }

    /// Register a server backed by a child-process stdio transport
    pub fn register_stdio_server(&self, name: &str, config: McpServerConfig) {
        self.register_server(name, Arc::new(StdioTransportFactory::new(config)));
    }

    /// Register a server with an arbitrary transport factory
    pub fn register_server(&self, name: &str, factory: Arc<dyn TransportFactory>) {
        self.factories.write().insert(name.to_string(), factory);
    }

    /// Names of servers with a live session
    #[must_use]
    pub fn connected_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_alive())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Whether a server currently has a live session
    #[must_use]
    pub fn is_connected(&self, server: &str) -> bool {
        self.sessions
            .get(server)
            .is_some_and(|entry| entry.value().is_alive())
    }

    /// Get or lazily establish the session for a server
    async fn session(&self, server: &str) -> Result<Arc<McpSession>> {
        if let Some(entry) = self.sessions.get(server) {
            if entry.value().is_alive() {
                return Ok(Arc::clone(entry.value()));
            }
        }

        let lock = Arc::clone(
            self.connect_locks
                .entry(server.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .value(),
        );
        let _guard = lock.lock().await;

        // Another caller may have connected while this one waited
        if let Some(entry) = self.sessions.get(server) {
            if entry.value().is_alive() {
                return Ok(Arc::clone(entry.value()));
            }
        }

        let factory = self
            .factories
            .read()
            .get(server)
            .cloned()
            .ok_or_else(|| McpError::NotConnected {
                server: server.to_string(),
            })?;

        let session = McpSession::connect(server, factory.as_ref(), self.connect_timeout).await?;
        if let Some(stale) = self.sessions.insert(server.to_string(), Arc::clone(&session)) {
            stale.shutdown().await;
        }
        Ok(session)
    }

    /// Invoke a tool; on transport failure the session is torn down,
    /// respawned with the original parameters, and the call retried once
    ///
    /// # Errors
    ///
    /// All of [`McpError`]; transport errors surface only after the single
    /// reconnect attempt also fails.
    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let deadline = deadline.unwrap_or(self.call_timeout);
        let session = self.session(server).await?;

        match session
            .call_tool(tool, arguments.clone(), deadline, cancel)
            .await
        {
            Err(err) if err.is_transport() => {
                warn!(server, tool, error = %err, "transport failure, reconnecting once");
                self.teardown(server).await;
                let session = self.session(server).await?;
                session.call_tool(tool, arguments, deadline, cancel).await
            }
            other => other,
        }
    }

    /// Tools exposed by a server, connecting lazily if needed
    pub async fn list_tools(&self, server: &str) -> Result<Vec<ToolInfo>> {
        Ok(self.session(server).await?.tools())
    }

    async fn teardown(&self, server: &str) {
        if let Some((_, session)) = self.sessions.remove(server) {
            session.shutdown().await;
        }
    }

    /// Disconnect one server
    pub async fn disconnect(&self, server: &str) {
        self.teardown(server).await;
        info!(server, "mcp server disconnected");
    }

    /// Disconnect every server; called at container teardown
    pub async fn disconnect_all(&self) {
        let names: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.teardown(&name).await;
        }
        info!("all mcp servers disconnected");
    }
}
