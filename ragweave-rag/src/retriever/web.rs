//! Web retriever over the MCP multiplexer

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

/// One hit as returned by the web search tool
///
/// Unknown fields are ignored; missing required fields fail the parse and
/// surface as `ToolExecution`.
#[derive(Debug, Deserialize)]
struct WebHit {
    title: String,
    url: String,
    snippet: String,
    #[serde(default)]
    score: Option<f32>,
}

/// Retriever calling an external search tool through MCP
pub struct WebRetriever {
    mcp: Arc<McpMultiplexer>,
    server: String,
    tool: String,
    max_results: usize,
    call_deadline: Duration,
}

impl std::fmt::Debug for WebRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRetriever")
            .field("server", &self.server)
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

impl WebRetriever {
    /// Create a retriever bound to a server's `web_search` tool
    pub fn new(mcp: Arc<McpMultiplexer>, server: impl Into<String>) -> Self {
        Self {
            mcp,
            server: server.into(),
            tool: "web_search".to_string(),
            max_results: 10,
            call_deadline: Duration::from_secs(10),
        }
    }

    /// Cap the number of results requested from the tool
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    #[allow(clippy::cast_precision_loss)]
    fn parse_results(&self, value: &Value) -> Result<Vec<SearchResult>> {
        let raw = value
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                RagError::tool_execution(format!(
                    "web search tool on '{}' returned no results array",
                    self.server
                ))
            })?;

        let mut results = Vec::with_capacity(raw.len());
        for (rank, item) in raw.iter().enumerate() {
            let hit: WebHit = serde_json::from_value(item.clone()).map_err(|e| {
                RagError::tool_execution(format!("malformed web search result: {e}"))
            })?;
            // Rank-decayed default when the tool reports no score
            let score = hit.score.unwrap_or(1.0 / (rank as f32 + 1.0));
            results.push(SearchResult {
                id: hit.url.clone(),
                document_id: String::new(),
                text: hit.snippet,
                score,
                document_name: hit.title,
                chunk_index: 0,
                metadata: [
                    ("url".to_string(), json!(hit.url)),
                    ("source".to_string(), json!("web")),
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
impl Retriever for WebRetriever {
    fn name(&self) -> &str {
        "web"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let num_results = request.top_k.min(self.max_results);
        let arguments = json!({
            "query": request.query_text,
            "num_results": num_results,
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
        debug!(results = results.len(), server = %self.server, "web retrieval complete");
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

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_mcp::testing::{Reply, ScriptedServer};
    use ragweave_mcp::ToolInfo;

    fn mux_with(reply: Reply) -> Arc<McpMultiplexer> {
        let server = ScriptedServer::new(
            vec![ToolInfo::new("web_search", "Search the web")],
            move |_, _| reply.clone(),
        );
        let mux = Arc::new(McpMultiplexer::new(
            Duration::from_millis(500),
            Duration::from_millis(500),
        ));
        mux.register_server("search_server", server);
        mux
    }

    #[tokio::test]
    async fn test_parses_results_and_normalizes_scores() {
        let mux = mux_with(Reply::Result(json!({
            "results": [
                {"title": "Rust", "url": "https://rust-lang.org", "snippet": "A language", "score": 0.9, "engine": "ignored"},
                {"title": "Wiki", "url": "https://wikipedia.org", "snippet": "An encyclopedia", "score": 0.3},
            ]
        })));
        let retriever = WebRetriever::new(mux, "search_server");

        let results = retriever
            .search(&SearchRequest::new("rust", 5))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "https://rust-lang.org");
        assert_eq!(results[0].metadata["source"], "web");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - 0.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_missing_required_field_is_tool_execution() {
        let mux = mux_with(Reply::Result(json!({
            "results": [{"title": "No url or snippet"}]
        })));
        let retriever = WebRetriever::new(mux, "search_server");

        let err = retriever
            .search(&SearchRequest::new("rust", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ToolExecution { .. }));
    }

    #[tokio::test]
    async fn test_missing_results_array_is_tool_execution() {
        let mux = mux_with(Reply::Result(json!({"unexpected": true})));
        let retriever = WebRetriever::new(mux, "search_server");
        let err = retriever
            .search(&SearchRequest::new("rust", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ToolExecution { .. }));
    }

    #[tokio::test]
    async fn test_health_checks_tool_presence() {
        let mux = mux_with(Reply::Result(json!({"results": []})));
        let retriever = WebRetriever::new(mux, "search_server");
        assert!(retriever.health().await.healthy);
    }
}
