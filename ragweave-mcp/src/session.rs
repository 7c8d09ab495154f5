//! One live MCP session
//!
//! A session owns a single serialized writer and a single reader that fans
//! responses out to per-request waiters by correlation id. `call_tool` is
//! safe from many concurrent callers; cancelling one call detaches only
//! that call's waiter and leaves the session usable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{McpError, Result};
use crate::protocol::{methods, Incoming, Notification, Request, ToolInfo, WireError};
use crate::transport::{Transport, TransportFactory};

/// Outcome delivered to a waiting caller
enum CallOutcome {
    Ok(Value),
    Wire(WireError),
    Closed,
}

enum WriteCmd {
    Line(String),
    Shutdown,
}

/// A connected session to one MCP server
pub struct McpSession {
    server: String,
    next_id: AtomicU64,
    pending: Arc<DashMap<u64, oneshot::Sender<CallOutcome>>>,
    write_tx: mpsc::Sender<WriteCmd>,
    tools: parking_lot::RwLock<HashMap<String, ToolInfo>>,
    alive: Arc<AtomicBool>,
    reader_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    writer_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("server", &self.server)
            .field("alive", &self.is_alive())
            .field("tools", &self.tools.read().len())
            .finish_non_exhaustive()
    }
}

impl McpSession {
    /// Connect, perform the `initialize` handshake, and cache the tool set
    ///
    /// # Errors
    ///
    /// Returns `Transport` when the spawn, handshake, or tool listing
    /// fails within `connect_timeout`.
    pub async fn connect(
        server: impl Into<String>,
        factory: &dyn TransportFactory,
        connect_timeout: Duration,
    ) -> Result<Arc<Self>> {
        let server = server.into();
        let transport = factory.connect().await?;
        let Transport {
            reader,
            writer,
            child,
        } = transport;

        let alive = Arc::new(AtomicBool::new(true));
        let pending: Arc<DashMap<u64, oneshot::Sender<CallOutcome>>> = Arc::new(DashMap::new());
        let (write_tx, mut write_rx) = mpsc::channel::<WriteCmd>(64);

        // Single serialized writer
        let writer_alive = Arc::clone(&alive);
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(cmd) = write_rx.recv().await {
                match cmd {
                    WriteCmd::Line(line) => {
                        let write = async {
                            writer.write_all(line.as_bytes()).await?;
                            writer.write_all(b"\n").await?;
                            writer.flush().await
                        };
                        if let Err(e) = write.await {
                            warn!(error = %e, "mcp writer failed");
                            writer_alive.store(false, Ordering::Release);
                            break;
                        }
                    }
                    WriteCmd::Shutdown => {
                        let _ = writer.shutdown().await;
                        break;
                    }
                }
            }
        });

        // Single reader fanning out to per-request waiters
        let reader_alive = Arc::clone(&alive);
        let reader_pending = Arc::clone(&pending);
        let reader_server = server.clone();
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Incoming>(trimmed) {
                            Ok(msg) => {
                                Self::dispatch(&reader_server, &reader_pending, msg);
                            }
                            Err(e) => {
                                warn!(server = %reader_server, error = %e, "malformed line from mcp server");
                            }
                        }
                    }
                    Ok(None) => {
                        debug!(server = %reader_server, "mcp server closed its stdout");
                        break;
                    }
                    Err(e) => {
                        warn!(server = %reader_server, error = %e, "mcp reader failed");
                        break;
                    }
                }
            }
            reader_alive.store(false, Ordering::Release);
            // Fail every waiter still attached to this session
            let ids: Vec<u64> = reader_pending.iter().map(|entry| *entry.key()).collect();
            for id in ids {
                if let Some((_, tx)) = reader_pending.remove(&id) {
                    let _ = tx.send(CallOutcome::Closed);
                }
            }
        });

        let session = Arc::new(Self {
            server,
            next_id: AtomicU64::new(1),
            pending,
            write_tx,
            tools: parking_lot::RwLock::new(HashMap::new()),
            alive,
            reader_task: parking_lot::Mutex::new(Some(reader_task)),
            writer_task: parking_lot::Mutex::new(Some(writer_task)),
            child: tokio::sync::Mutex::new(child),
        });

        // Handshake, then tool discovery
        let cancel = CancellationToken::new();
        session
            .call(methods::INITIALIZE, json!({}), connect_timeout, &cancel)
            .await
            .map_err(|e| McpError::Transport {
                message: format!("initialize handshake failed: {e}"),
            })?;

        let listed = session
            .call(methods::LIST_TOOLS, json!({}), connect_timeout, &cancel)
            .await
            .map_err(|e| McpError::Transport {
                message: format!("list_tools failed: {e}"),
            })?;
        let tools: Vec<ToolInfo> = listed
            .get("tools")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::Transport {
                message: format!("malformed tool list: {e}"),
            })?
            .unwrap_or_default();
        info!(server = %session.server, tools = tools.len(), "mcp session established");
        *session.tools.write() = tools.into_iter().map(|t| (t.name.clone(), t)).collect();

        Ok(session)
    }

    fn dispatch(server: &str, pending: &DashMap<u64, oneshot::Sender<CallOutcome>>, msg: Incoming) {
        if let Some(id) = msg.id {
            let Some((_, tx)) = pending.remove(&id) else {
                // Deadline already detached this waiter
                trace!(server, id, "response for detached request");
                return;
            };
            let outcome = match (msg.result, msg.error) {
                (_, Some(error)) => CallOutcome::Wire(error),
                (Some(result), None) => CallOutcome::Ok(result),
                (None, None) => CallOutcome::Ok(Value::Null),
            };
            let _ = tx.send(outcome);
        } else if let Some(method) = msg.method {
            // Progress and cancellation acknowledgements arrive as
            // notifications; nothing waits on them
            trace!(server, method, "notification from mcp server");
        }
    }

    /// Whether the transport is still usable
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Cached tool descriptors from the handshake
    #[must_use]
    pub fn tools(&self) -> Vec<ToolInfo> {
        self.tools.read().values().cloned().collect()
    }

    /// Whether the server exposes a tool
    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Invoke a tool with a deadline and a cancellation scope
    ///
    /// # Errors
    ///
    /// `UnknownTool` for names outside the cached tool set, `Timeout` when
    /// the deadline passes (a cancellation notice is sent and the waiter
    /// detached), `Cancelled` when the token fires, `ToolExecution` for
    /// error responses, `Transport` when the session dies mid-call.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if !self.has_tool(name) {
            return Err(McpError::UnknownTool {
                server: self.server.clone(),
                tool: name.to_string(),
            });
        }
        self.call(
            methods::CALL_TOOL,
            json!({"name": name, "arguments": arguments}),
            deadline,
            cancel,
        )
        .await
    }

    /// Issue one request and await its correlated response
    async fn call(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if !self.is_alive() {
            return Err(McpError::Transport {
                message: format!("session to '{}' is closed", self.server),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let line = serde_json::to_string(&Request { id, method, params }).map_err(|e| {
            self.pending.remove(&id);
            McpError::Transport {
                message: format!("request serialization failed: {e}"),
            }
        })?;

        if self.write_tx.send(WriteCmd::Line(line)).await.is_err() {
            self.pending.remove(&id);
            return Err(McpError::Transport {
                message: format!("writer to '{}' is gone", self.server),
            });
        }

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                self.detach_with_notice(id);
                return Err(McpError::Cancelled {
                    message: format!("call {id} to '{}' cancelled", self.server),
                });
            }
            outcome = tokio::time::timeout(deadline, rx) => outcome,
        };

        match outcome {
            Err(_elapsed) => {
                self.detach_with_notice(id);
                Err(McpError::Timeout {
                    message: format!(
                        "call {id} to '{}' exceeded {}ms",
                        self.server,
                        deadline.as_millis()
                    ),
                })
            }
            Ok(Err(_sender_dropped)) => Err(McpError::Transport {
                message: format!("session to '{}' closed while waiting", self.server),
            }),
            Ok(Ok(CallOutcome::Closed)) => Err(McpError::Transport {
                message: format!("session to '{}' closed while waiting", self.server),
            }),
            Ok(Ok(CallOutcome::Wire(error))) => {
                if method == methods::CALL_TOOL {
                    Err(McpError::ToolExecution {
                        message: error.message,
                    })
                } else {
                    Err(McpError::Transport {
                        message: format!("{method} rejected: {}", error.message),
                    })
                }
            }
            Ok(Ok(CallOutcome::Ok(value))) => Ok(value),
        }
    }

    /// Detach a waiter and send a best-effort cancellation notice
    fn detach_with_notice(&self, id: u64) {
        self.pending.remove(&id);
        let notice = Notification {
            method: methods::CANCEL,
            params: json!({"request_id": id}),
        };
        if let Ok(line) = serde_json::to_string(&notice) {
            // Best effort: a full write queue or dead writer changes nothing
            let _ = self.write_tx.try_send(WriteCmd::Line(line));
        }
        debug!(server = %self.server, id, "detached call and sent cancellation notice");
    }

    /// Close stdio, wait for the child to exit, and reap it
    pub async fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);
        let _ = self.write_tx.send(WriteCmd::Shutdown).await;

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(server = %self.server, %status, "mcp server exited");
                }
                Ok(Err(e)) => warn!(server = %self.server, error = %e, "wait for mcp server failed"),
                Err(_elapsed) => {
                    warn!(server = %self.server, "mcp server did not exit, killing");
                    let _ = child.kill().await;
                }
            }
        }

        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.writer_task.lock().take() {
            task.abort();
        }
        info!(server = %self.server, "mcp session shut down");
    }
}
