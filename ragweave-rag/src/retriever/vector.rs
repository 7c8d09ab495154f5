//! Vector retriever
//!
//! Embeds the query, searches the vector store with complexity-adaptive
//! parameters, optionally expands the query into paraphrases fused by
//! reciprocal-rank aggregation, optionally reranks, and min-max
//! normalizes scores into `[0, 1]` within the request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, warn};

use ragweave_core::error::{RagError, Result};
use ragweave_core::math::min_max_normalize;
use ragweave_core::traits::{
    Embedder, GenerationRequest, Generator, HealthStatus, Retriever, SearchRequest,
};
use ragweave_core::types::SearchResult;
use ragweave_storage::{to_search_result, FilterExpr, ScoredRow, VectorStore};

use crate::cache::{CacheType, TieredCache};

/// Reciprocal-rank fusion constant
const RRF_K: f32 = 60.0;

/// Vector retriever options
#[derive(Debug, Clone)]
pub struct VectorRetrieverConfig {
    /// Expand the query into paraphrases and fuse results
    pub expand_queries: bool,
    /// Maximum paraphrases generated per query
    pub max_paraphrases: usize,
    /// Candidate over-fetch factor before truncation
    pub candidate_multiplier: usize,
}

impl Default for VectorRetrieverConfig {
    fn default() -> Self {
        Self {
            expand_queries: false,
            max_paraphrases: 2,
            candidate_multiplier: 2,
        }
    }
}

/// Retriever over the vector store
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    cache: Arc<TieredCache>,
    generator: Option<Arc<dyn Generator>>,
    reranker: Option<Arc<dyn crate::rerank::Reranker>>,
    config: VectorRetrieverConfig,
}

impl std::fmt::Debug for VectorRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRetriever")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VectorRetriever {
    /// Create a retriever
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        cache: Arc<TieredCache>,
        config: VectorRetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            cache,
            generator: None,
            reranker: None,
            config,
        }
    }

    /// Enable paraphrase expansion through a generator
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Enable reranking
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn crate::rerank::Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    fn cache_key(request: &SearchRequest) -> String {
        format!(
            "{}|{}|{}",
            request.query_text,
            request.top_k,
            request.partitions.join(",")
        )
    }

    fn filter_from(request: &SearchRequest) -> Option<FilterExpr> {
        if request.filters.is_empty() {
            return None;
        }
        let parts: Vec<FilterExpr> = request
            .filters
            .iter()
            .map(|(field, value)| FilterExpr::eq(field.clone(), value.clone()))
            .collect();
        Some(if parts.len() == 1 {
            parts.into_iter().next().unwrap_or(FilterExpr::And(vec![]))
        } else {
            FilterExpr::And(parts)
        })
    }

    /// Generate up to `max_paraphrases` reformulations of the query
    async fn paraphrases(&self, request: &SearchRequest) -> Vec<String> {
        let Some(generator) = &self.generator else {
            return Vec::new();
        };
        let prompt = format!(
            "Rewrite the search query below into {} alternative phrasings that \
             preserve its intent. One per line, no numbering.\n\nQuery: {}",
            self.config.max_paraphrases, request.query_text
        );
        let generation = GenerationRequest::new(prompt)
            .for_assessment()
            .with_cancel(request.cancel.clone());
        match generator.generate(&generation).await {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .take(self.config.max_paraphrases)
                .map(str::to_string)
                .collect(),
            Err(e) => {
                warn!(error = %e, "query expansion failed, searching unexpanded");
                Vec::new()
            }
        }
    }

    /// Fuse ranked lists by reciprocal rank, keeping each id's best row
    #[allow(clippy::cast_precision_loss)]
    fn fuse_reciprocal_rank(lists: Vec<Vec<ScoredRow>>) -> Vec<ScoredRow> {
        let mut fused: HashMap<String, (ScoredRow, f32)> = HashMap::new();
        for list in lists {
            for (rank, scored) in list.into_iter().enumerate() {
                let contribution = 1.0 / (RRF_K + rank as f32 + 1.0);
                match fused.get_mut(&scored.row.id) {
                    Some((_, total)) => *total += contribution,
                    None => {
                        fused.insert(scored.row.id.clone(), (scored, contribution));
                    }
                }
            }
        }
        let mut rows: Vec<ScoredRow> = fused
            .into_values()
            .map(|(mut scored, total)| {
                scored.score = total;
                scored
            })
            .collect();
        rows.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }

    fn search_mode(complexity: f32) -> &'static str {
        if complexity < 0.3 {
            "fast"
        } else if complexity > 0.7 {
            "deep"
        } else {
            "balanced"
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    fn name(&self) -> &str {
        "vector"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.query_text.trim().is_empty() {
            return Err(RagError::invalid_argument("query text cannot be empty"));
        }
        if request.top_k == 0 {
            return Err(RagError::invalid_argument("top_k must be positive"));
        }

        let cache_key = Self::cache_key(request);
        if let Some(cached) = self.cache.get(CacheType::Search, &cache_key).await {
            if let Ok(results) = serde_json::from_value::<Vec<SearchResult>>(cached) {
                debug!(key = %cache_key, "vector search cache hit");
                return Ok(results);
            }
        }

        // The original query plus any paraphrases, each searched with the
        // same adaptive parameters
        let mut queries = vec![request.query_text.clone()];
        if self.config.expand_queries {
            queries.extend(self.paraphrases(request).await);
        }

        let embeddings = self.embedder.embed(&queries).await?;
        let candidates = request.top_k * self.config.candidate_multiplier.max(1);
        let filter = Self::filter_from(request);

        let searches = embeddings.iter().map(|embedding| {
            self.store.search(
                embedding,
                candidates,
                request.complexity,
                filter.as_ref(),
                &request.partitions,
                &request.cancel,
            )
        });
        let outcomes = join_all(searches).await;

        let mut lists = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(rows) => lists.push(rows),
                // A failed paraphrase search degrades coverage, not the call
                Err(e) if lists.is_empty() => return Err(e),
                Err(e) => warn!(error = %e, "expanded query search failed"),
            }
        }

        let fused = if lists.len() > 1 {
            Self::fuse_reciprocal_rank(lists)
        } else {
            lists.into_iter().next().unwrap_or_default()
        };

        let mode = Self::search_mode(request.complexity);
        let mut results: Vec<SearchResult> = fused
            .into_iter()
            .map(|scored| {
                to_search_result(scored)
                    .with_metadata("search_mode", json!(mode))
                    .with_metadata("query_complexity", json!(request.complexity))
            })
            .collect();

        if let Some(reranker) = &self.reranker {
            results = reranker.rerank(&request.query_text, results);
        }

        // Normalize within the request so scores are comparable downstream
        let mut scores: Vec<f32> = results.iter().map(|r| r.score).collect();
        min_max_normalize(&mut scores);
        for (result, score) in results.iter_mut().zip(scores) {
            result.score = score;
        }
        results.truncate(request.top_k);

        if !results.is_empty() {
            let value = serde_json::to_value(&results)
                .unwrap_or_else(|_| json!([]));
            self.cache.set(CacheType::Search, &cache_key, value).await;
        }

        debug!(
            results = results.len(),
            mode, "vector retrieval complete"
        );
        Ok(results)
    }

    async fn health(&self) -> HealthStatus {
        let report = self
            .store
            .health_check(&tokio_util::sync::CancellationToken::new())
            .await;
        if report.connected && report.collection_exists {
            HealthStatus::healthy(format!(
                "collection '{}' with {} entities",
                self.store.collection(),
                report.entity_count.unwrap_or(0)
            ))
        } else {
            HealthStatus::unhealthy(report.detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryRemoteCache;
    use crate::embedding::MockEmbedder;
    use ragweave_config::CacheConfig;
    use ragweave_core::types::{ChunkRecord, DistanceMetric};
    use ragweave_storage::{
        chunk_collection_schema, ConnectionPool, InMemoryVectorBackend, SharedClientFactory,
        VectorBackend,
    };
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const DIM: usize = 32;

    async fn retriever_with_corpus(texts: &[(&str, &str)]) -> VectorRetriever {
        let backend: Arc<dyn VectorBackend> = Arc::new(InMemoryVectorBackend::new());
        let pool = Arc::new(ConnectionPool::new(
            Arc::new(SharedClientFactory::new(backend)),
            4,
            Duration::from_secs(300),
        ));
        let store = Arc::new(VectorStore::new(
            pool,
            "documents",
            DIM,
            DistanceMetric::Cosine,
            false,
        ));
        let cancel = CancellationToken::new();
        store
            .ensure_collection(&chunk_collection_schema("documents", DIM), &cancel)
            .await
            .unwrap();

        let embedder = Arc::new(MockEmbedder::new(DIM));
        if !texts.is_empty() {
            let mut chunks = Vec::new();
            for (i, (doc, text)) in texts.iter().enumerate() {
                let embedding = embedder.embed(&[(*text).to_string()]).await.unwrap();
                let mut chunk = ChunkRecord::new(
                    format!("c{i}"),
                    *doc,
                    *text,
                    0,
                    format!("{doc}.txt"),
                    embedding.into_iter().next().unwrap(),
                );
                chunk.upload_date = 1_700_000_000;
                chunks.push(chunk);
            }
            store.insert_chunks(&chunks, None, &cancel).await.unwrap();
        }

        let cache = Arc::new(TieredCache::new(
            &CacheConfig::default(),
            Arc::new(InMemoryRemoteCache::new(100)),
        ));
        VectorRetriever::new(embedder, store, cache, VectorRetrieverConfig::default())
    }

    #[tokio::test]
    async fn test_scores_normalized_to_unit_range() {
        let retriever = retriever_with_corpus(&[
            ("d1", "rust ownership and borrowing"),
            ("d2", "python garbage collection"),
            ("d3", "java virtual machine internals"),
        ])
        .await;

        let request = SearchRequest::new("rust ownership and borrowing", 3);
        let results = retriever.search(&request).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
        // Exact text match ranks first at full score
        assert_eq!(results[0].document_id, "d1");
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_collection_returns_empty() {
        let retriever = retriever_with_corpus(&[]).await;
        let request = SearchRequest::new("anything", 5);
        let results = retriever.search(&request).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_search_served_from_cache() {
        let retriever =
            retriever_with_corpus(&[("d1", "rust ownership and borrowing")]).await;
        let request = SearchRequest::new("rust ownership", 3);

        let first = retriever.search(&request).await.unwrap();
        let second = retriever.search(&request).await.unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].id, second[0].id);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let retriever = retriever_with_corpus(&[]).await;
        let request = SearchRequest::new("  ", 3);
        assert!(matches!(
            retriever.search(&request).await,
            Err(RagError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_health_reports_collection() {
        let retriever = retriever_with_corpus(&[("d1", "text")]).await;
        let health = retriever.health().await;
        assert!(health.healthy);
    }

    #[test]
    fn test_rrf_prefers_items_ranked_well_in_both_lists() {
        fn row(id: &str, score: f32) -> ScoredRow {
            ScoredRow {
                row: ragweave_storage::VectorRow::new(id, vec![0.0]),
                score,
            }
        }
        let fused = VectorRetriever::fuse_reciprocal_rank(vec![
            vec![row("a", 0.9), row("b", 0.8), row("c", 0.7)],
            vec![row("b", 0.9), row("a", 0.8), row("d", 0.7)],
        ]);
        // a and b appear high in both lists; c and d only in one
        assert!(fused.iter().position(|r| r.row.id == "a").unwrap() < 2);
        assert!(fused.iter().position(|r| r.row.id == "b").unwrap() < 2);
        assert!(fused.iter().position(|r| r.row.id == "c").unwrap() >= 2);
    }
}
