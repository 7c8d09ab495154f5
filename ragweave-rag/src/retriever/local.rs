//! Local-data retriever over the MCP multiplexer
//!
//! Reads files or queries a local database through a tool server; the
//! filesystem allow-list and read-only SQL enforcement live inside the
//! child process, not here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use ragweave_core::error::{RagError, Result};
use ragweave_core::math::min_max_normalize;
use ragweave_core::traits::{HealthStatus, Retriever, SearchRequest};
use ragweave_core::types::SearchResult;
use ragweave_mcp::McpMultiplexer;

/// One text block with provenance, as returned by the local-data tool
#[derive(Debug, Deserialize)]
struct LocalHit {
    source: String,
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

/// Retriever for local files and databases exposed via MCP
pub struct LocalDataRetriever {
    mcp: Arc<McpMultiplexer>,
    server: String,
    tool: String,
    call_deadline: Duration,
}

impl std::fmt::Debug for LocalDataRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDataRetriever")
            .field("server", &self.server)
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

impl LocalDataRetriever {
    /// Create a retriever bound to a server's `local_search` tool
    pub fn new(mcp: Arc<McpMultiplexer>, server: impl Into<String>) -> Self {
        Self {
            mcp,
            server: server.into(),
            tool: "local_search".to_string(),
            call_deadline: Duration::from_secs(10),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn parse_results(&self, value: &Value) -> Result<Vec<SearchResult>> {
        let raw = value
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                RagError::tool_execution(format!(
                    "local data tool on '{}' returned no results array",
                    self.server
                ))
            })?;

        let mut results = Vec::with_capacity(raw.len());
        for (rank, item) in raw.iter().enumerate() {
            let hit: LocalHit = serde_json::from_value(item.clone()).map_err(|e| {
                RagError::tool_execution(format!("malformed local data result: {e}"))
            })?;
            let score = hit.score.unwrap_or(1.0 / (rank as f32 + 1.0));
            results.push(SearchResult {
                id: format!("local:{}", hit.source),
                document_id: String::new(),
                text: hit.content,
                score,
                document_name: hit.source.clone(),
                chunk_index: 0,
                metadata: [
                    ("source".to_string(), json!("local")),
                    ("provenance".to_string(), json!(hit.source)),
                ]
                .into_iter()
                .collect(),
            });
        }

        let mut scores: Vec<f32> = results.iter().map(|r| r.score).collect();
        min_max_normalize(&mut scores);
        for (result, score) in results.iter_mut().zip(scores) {
            result.score = score;
        }
        Ok(results)
    }
}

#[async_trait]
impl Retriever for LocalDataRetriever {
    fn name(&self) -> &str {
        "local"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let arguments = json!({
            "query": request.query_text,
            "limit": request.top_k,
        });

        let value = self
            .mcp
            .call_tool(
                &self.server,
                &self.tool,
                arguments,
                Some(self.call_deadline),
                &request.cancel,
            )
            .await
            .map_err(RagError::from)?;

        let results = self.parse_results(&value)?;
        debug!(results = results.len(), server = %self.server, "local retrieval complete");
        Ok(results)
    }

    async fn health(&self) -> HealthStatus {
        match self.mcp.list_tools(&self.server).await {
            Ok(tools) if tools.iter().any(|t| t.name == self.tool) => {
                HealthStatus::healthy(format!("server '{}' exposes {}", self.server, self.tool))
            }
            Ok(_) => HealthStatus::unhealthy(format!(
                "server '{}' does not expose {}",
                self.server, self.tool
            )),
            Err(e) => HealthStatus::unhealthy(format!("server '{}' unavailable: {e}", self.server)),
        }
    }
}
