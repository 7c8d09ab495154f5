//! Scripted in-memory MCP server for tests
//!
//! Implements [`TransportFactory`] over a duplex pipe so session and
//! multiplexer behavior (correlation, timeouts, reconnection) can be
//! exercised without spawning subprocesses. The server answers
//! `initialize` and `list_tools` itself; `call_tool` requests go through
//! the supplied handler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::protocol::{methods, Incoming, ToolInfo};
use crate::transport::{Transport, TransportFactory};

/// How the scripted server answers one `call_tool` request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond successfully with this payload
    Result(Value),
    /// Respond with an error object
    Error(String),
    /// Never respond (exercises deadlines)
    Ignore,
    /// Respond successfully after a delay (exercises out-of-order
    /// correlation and slow tools)
    Delayed(Duration, Value),
}

type Handler = dyn Fn(&str, &Value) -> Reply + Send + Sync;

/// Scripted MCP server factory
pub struct ScriptedServer {
    tools: Vec<ToolInfo>,
    handler: Arc<Handler>,
    connects: AtomicUsize,
    current: parking_lot::Mutex<Option<CancellationToken>>,
}

impl ScriptedServer {
    /// Create a server exposing `tools` and answering calls via `handler`
    pub fn new(
        tools: Vec<ToolInfo>,
        handler: impl Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            tools,
            handler: Arc::new(handler),
            connects: AtomicUsize::new(0),
            current: parking_lot::Mutex::new(None),
        })
    }

    /// How many times a transport has been established
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }

    /// Kill the current connection, simulating a child dying mid-call
    pub fn kill_current(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
    }
}

#[async_trait]
impl TransportFactory for ScriptedServer {
    async fn connect(&self) -> Result<Transport> {
        self.connects.fetch_add(1, Ordering::Release);

        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (client_reader, client_writer) = tokio::io::split(client_side);
        let (server_reader, server_writer) = tokio::io::split(server_side);

        let token = CancellationToken::new();
        *self.current.lock() = Some(token.clone());

        let tools = self.tools.clone();
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            let serve = run_server(server_reader, server_writer, tools, handler);
            tokio::select! {
                () = token.cancelled() => {}
                () = serve => {}
            }
            // Dropping the server side closes the pipe; the client reader
            // sees EOF, like a child process dying
        });

        Ok(Transport {
            reader: Box::new(client_reader),
            writer: Box::new(client_writer),
            child: None,
        })
    }
}

async fn run_server(
    reader: tokio::io::ReadHalf<tokio::io::DuplexStream>,
    writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    tools: Vec<ToolInfo>,
    handler: Arc<Handler>,
) {
    let writer = Arc::new(tokio::sync::Mutex::new(writer));
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(msg) = serde_json::from_str::<Incoming>(&line) else {
            continue;
        };
        let Some(id) = msg.id else {
            // Notifications (e.g. cancel) need no reply
            continue;
        };
        let method = msg.method.as_deref().unwrap_or_default();
        let params = msg.params.unwrap_or(Value::Null);

        let response = match method {
            methods::INITIALIZE => json!({"id": id, "result": {"protocol": "line-json", "ready": true}}),
            methods::LIST_TOOLS => json!({"id": id, "result": {"tools": tools}}),
            methods::CALL_TOOL => {
                let name = params["name"].as_str().unwrap_or_default().to_string();
                let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
                match handler(&name, &arguments) {
                    Reply::Result(value) => json!({"id": id, "result": value}),
                    Reply::Error(message) => json!({"id": id, "error": {"message": message}}),
                    Reply::Ignore => continue,
                    Reply::Delayed(delay, value) => {
                        let writer = Arc::clone(&writer);
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let line = json!({"id": id, "result": value}).to_string();
                            let mut writer = writer.lock().await;
                            let _ = writer.write_all(line.as_bytes()).await;
                            let _ = writer.write_all(b"\n").await;
                            let _ = writer.flush().await;
                        });
                        continue;
                    }
                }
            }
            _ => json!({"id": id, "error": {"message": format!("unknown method '{method}'")}}),
        };

        let line = response.to_string();
        let mut writer = writer.lock().await;
        if writer.write_all(line.as_bytes()).await.is_err()
            || writer.write_all(b"\n").await.is_err()
            || writer.flush().await.is_err()
        {
            break;
        }
    }
}
