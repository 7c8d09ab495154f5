//! Routed response types
//!
//! In balanced mode a consumer sees a sequence of updates: one `Interim`
//! (speculative) followed by one `Final` or `Fallback`. Single-path modes
//! produce exactly one terminal response.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::search::SearchResult;
use super::strategy::StrategyKind;
use crate::error::ErrorKind;

/// Status of an emitted response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Preliminary speculative result; a final one follows
    Interim,
    /// Terminal result from the winning path
    Final,
    /// Terminal result from the speculative path after the agentic path
    /// timed out or failed
    Fallback,
}

/// One answer emitted by the router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Synthesized answer text
    pub answer: String,
    /// Evidence backing the answer
    pub sources: Vec<SearchResult>,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
    /// Strategy that produced this answer
    pub strategy_used: StrategyKind,
    /// Interim, final, or fallback
    pub status: ResponseStatus,
    /// Quality metadata: timings, corrections, degradation annotations
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl QueryResponse {
    /// Attach a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Streaming update emitted on the router's update channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouteUpdate {
    /// Speculative result, to be superseded
    Interim(QueryResponse),
    /// Terminal result
    Final(QueryResponse),
}

/// Terminal outcome of routing one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedResult {
    /// Request correlation id
    pub request_id: Uuid,
    /// The terminal response
    pub response: QueryResponse,
    /// Speculative path latency, when that path ran to completion
    pub speculative_ms: Option<u64>,
    /// Agentic path latency, when that path ran to completion
    pub agentic_ms: Option<u64>,
}

/// Error payload surfaced to the caller when routing fails entirely
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedError {
    /// Request correlation id
    pub request_id: Uuid,
    /// Most informative error category across failed paths
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
}

impl RoutedError {
    /// Build the user-visible payload from a routing failure
    pub fn new(request_id: Uuid, error: &crate::error::RagError) -> Self {
        Self {
            request_id,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
