//! Retriever capability trait
//!
//! Every specialist retriever (vector, web, local data) implements this
//! uniform surface so the reasoning engine can dispatch over `dyn
//! Retriever` handles without knowing the backing transport.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::SearchResult;

/// One retrieval request
///
/// Carries the cancellation token from the request boundary; every
/// suspension point inside a retriever must respect it.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Query text
    pub query_text: String,
    /// Result count
    pub top_k: usize,
    /// Query complexity in `[0, 1]`, drives adaptive search params
    pub complexity: f32,
    /// Field-equality filters applied before ANN probing
    pub filters: HashMap<String, String>,
    /// Restrict to these partitions (vector retriever only)
    pub partitions: Vec<String>,
    /// Cancellation scope propagated from the request boundary
    pub cancel: CancellationToken,
}

impl SearchRequest {
    /// Create a request with balanced complexity and no filters
    pub fn new(query_text: impl Into<String>, top_k: usize) -> Self {
        Self {
            query_text: query_text.into(),
            top_k,
            complexity: 0.5,
            filters: HashMap::new(),
            partitions: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the complexity score
    #[must_use]
    pub const fn with_complexity(mut self, complexity: f32) -> Self {
        self.complexity = complexity;
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Health probe result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the retriever can serve requests right now
    pub healthy: bool,
    /// Short diagnostic detail
    pub detail: String,
}

impl HealthStatus {
    /// A healthy status with detail
    pub fn healthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: true,
            detail: detail.into(),
        }
    }

    /// An unhealthy status with detail
    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            detail: detail.into(),
        }
    }
}

/// Uniform retrieval capability
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retriever name used in logs and source provenance
    fn name(&self) -> &str;

    /// Execute a search
    ///
    /// # Errors
    ///
    /// Returns `Transport`/`ToolExecution` after the single permitted
    /// retry, `Cancelled` when the request token fires, or
    /// `InvalidArgument` for malformed requests.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>>;

    /// Probe availability; consulted by the engine before dispatching
    async fn health(&self) -> HealthStatus;
}
