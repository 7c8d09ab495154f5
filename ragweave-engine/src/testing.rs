//! Test doubles for the execution paths
//!
//! Closure-driven generators and static retrievers let router and engine
//! behavior be scripted without external services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ragweave_core::error::{RagError, Result};
use ragweave_core::traits::{
    GenerationRequest, Generator, HealthStatus, Retriever, SearchRequest,
};
use ragweave_core::types::SearchResult;

type GeneratorFn = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Generator answering from a closure over the prompt text
pub struct ClosureGenerator {
    f: Box<GeneratorFn>,
}

impl std::fmt::Debug for ClosureGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureGenerator").finish_non_exhaustive()
    }
}

impl ClosureGenerator {
    /// Create a generator from a prompt handler
    pub fn new(f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl Generator for ClosureGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if request.cancel.is_cancelled() {
            return Err(RagError::cancelled("generation cancelled"));
        }
        (self.f)(&request.prompt)
    }
}

/// Generator that sleeps before delegating; used for timeout scenarios
pub struct SlowGenerator {
    inner: Arc<dyn Generator>,
    delay: Duration,
}

impl std::fmt::Debug for SlowGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlowGenerator")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl SlowGenerator {
    /// Wrap a generator with a fixed delay
    pub fn new(inner: Arc<dyn Generator>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl Generator for SlowGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        tokio::select! {
            () = request.cancel.cancelled() => {
                return Err(RagError::cancelled("generation cancelled"));
            }
            () = tokio::time::sleep(self.delay) => {}
        }
        self.inner.generate(request).await
    }
}

/// Retriever returning a fixed result list
#[derive(Debug, Clone)]
pub struct StaticRetriever {
    name: String,
    results: Vec<SearchResult>,
    healthy: bool,
}

impl StaticRetriever {
    /// Create a healthy retriever with fixed results
    pub fn new(name: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            name: name.into(),
            results,
            healthy: true,
        }
    }

    /// Mark the retriever unhealthy
    #[must_use]
    pub const fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.cancel.is_cancelled() {
            return Err(RagError::cancelled("search cancelled"));
        }
        Ok(self.results.iter().take(request.top_k).cloned().collect())
    }

    async fn health(&self) -> HealthStatus {
        if self.healthy {
            HealthStatus::healthy("static")
        } else {
            HealthStatus::unhealthy("static retriever marked down")
        }
    }
}

/// Retriever that always fails with a transport error
#[derive(Debug, Clone, Default)]
pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchResult>> {
        Err(RagError::transport("retriever backend unreachable"))
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::unhealthy("always failing")
    }
}

/// Build a search result for tests
#[must_use]
pub fn search_result(id: &str, document_id: &str, text: &str, score: f32) -> SearchResult {
    SearchResult {
        id: id.to_string(),
        document_id: document_id.to_string(),
        text: text.to_string(),
        score,
        document_name: format!("{document_id}.txt"),
        chunk_index: 0,
        metadata: Default::default(),
    }
}
