//! In-memory vector backend
//!
//! Brute-force implementation of the backend contract using `HashMap`
//! storage and exact similarity under the collection metric. Suited to
//! tests, development, and small local corpora; the contract semantics
//! (flush visibility, load-before-search, metric enforcement, partition
//! elimination) match what a remote store provides.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use ragweave_core::error::{RagError, Result};
use ragweave_core::math::cosine_similarity;
use ragweave_core::types::DistanceMetric;

use crate::backend::VectorBackend;
use crate::schema::CollectionSchema;
use crate::types::{
    CollectionInfo, FilterExpr, IndexSpec, PartitionStats, ScoredRow, SearchParams, VectorRow,
};

struct CollectionState {
    schema: CollectionSchema,
    dimension: usize,
    index: IndexSpec,
    /// Rows visible to search
    rows: RwLock<HashMap<String, VectorRow>>,
    /// Rows written but not yet flushed
    staged: RwLock<Vec<VectorRow>>,
    partitions: RwLock<HashSet<String>>,
    loaded: AtomicBool,
}

/// Thread-safe in-memory vector backend
#[derive(Default)]
pub struct InMemoryVectorBackend {
    collections: DashMap<String, Arc<CollectionState>>,
}

impl std::fmt::Debug for InMemoryVectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorBackend")
            .field("collections", &self.collections.len())
            .finish()
    }
}

impl InMemoryVectorBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> Result<Arc<CollectionState>> {
        self.collections
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RagError::not_found(format!("collection '{name}' does not exist")))
    }

    fn score(metric: DistanceMetric, query: &[f32], candidate: &[f32]) -> f32 {
        match metric {
            DistanceMetric::Cosine => cosine_similarity(query, candidate),
            DistanceMetric::Ip => query.iter().zip(candidate).map(|(a, b)| a * b).sum(),
            DistanceMetric::L2 => {
                let dist: f32 = query
                    .iter()
                    .zip(candidate)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

#[async_trait]
impl VectorBackend for InMemoryVectorBackend {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn has_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.contains_key(collection))
    }

    async fn create_collection(&self, schema: &CollectionSchema, index: &IndexSpec) -> Result<()> {
        if self.collections.contains_key(&schema.name) {
            debug!(collection = %schema.name, "collection already exists");
            return Ok(());
        }
        let dimension = schema.dimension().ok_or_else(|| {
            RagError::invalid_argument(format!(
                "schema for '{}' declares no vector field",
                schema.name
            ))
        })?;
        self.collections.insert(
            schema.name.clone(),
            Arc::new(CollectionState {
                schema: schema.clone(),
                dimension,
                index: *index,
                rows: RwLock::new(HashMap::new()),
                staged: RwLock::new(Vec::new()),
                partitions: RwLock::new(HashSet::new()),
                loaded: AtomicBool::new(false),
            }),
        );
        Ok(())
    }

    async fn describe_collection(&self, collection: &str) -> Result<CollectionInfo> {
        let state = self.collection(collection)?;
        let info = CollectionInfo {
            name: state.schema.name.clone(),
            dimension: state.dimension,
            index: Some(state.index),
            entity_count: state.rows.read().len(),
            loaded: state.loaded.load(Ordering::Acquire),
        };
        Ok(info)
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.remove(collection);
        Ok(())
    }

    async fn load_collection(&self, collection: &str) -> Result<()> {
        let state = self.collection(collection)?;
        state.loaded.store(true, Ordering::Release);
        Ok(())
    }

    async fn insert(&self, collection: &str, rows: Vec<VectorRow>) -> Result<Vec<String>> {
        if rows.is_empty() {
            return Err(RagError::invalid_argument("insert requires at least one row"));
        }
        let state = self.collection(collection)?;
        for (i, row) in rows.iter().enumerate() {
            if row.embedding.len() != state.dimension {
                return Err(RagError::invalid_argument(format!(
                    "row {i} has dimension {}, collection '{collection}' expects {}",
                    row.embedding.len(),
                    state.dimension
                )));
            }
        }
        let ids = rows.iter().map(|r| r.id.clone()).collect();
        state.staged.write().extend(rows);
        Ok(ids)
    }

    async fn flush(&self, collection: &str) -> Result<()> {
        let state = self.collection(collection)?;
        let staged = std::mem::take(&mut *state.staged.write());
        if staged.is_empty() {
            return Ok(());
        }
        let mut rows = state.rows.write();
        for row in staged {
            if let Some(partition) = &row.partition {
                state.partitions.write().insert(partition.clone());
            }
            rows.insert(row.id.clone(), row);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        params: &SearchParams,
        filter: Option<&FilterExpr>,
        partitions: &[String],
    ) -> Result<Vec<ScoredRow>> {
        let state = self.collection(collection)?;
        if !state.loaded.load(Ordering::Acquire) {
            return Err(RagError::internal(format!(
                "collection '{collection}' is not loaded"
            )));
        }
        if embedding.len() != state.dimension {
            return Err(RagError::invalid_argument(format!(
                "query dimension {} does not match collection dimension {}",
                embedding.len(),
                state.dimension
            )));
        }
        if params.metric != state.index.metric {
            return Err(RagError::index_mismatch(format!(
                "search metric {} does not match index metric {}",
                params.metric, state.index.metric
            )));
        }

        let rows = state.rows.read();
        let mut scored: Vec<ScoredRow> = rows
            .values()
            .filter(|row| {
                // Partition predicate eliminates rows before scoring
                if !partitions.is_empty() {
                    match &row.partition {
                        Some(p) if partitions.iter().any(|want| want == p) => {}
                        _ => return false,
                    }
                }
                filter.map_or(true, |f| f.matches(row))
            })
            .map(|row| ScoredRow {
                row: row.clone(),
                score: Self::score(params.metric, embedding, &row.embedding),
            })
            .collect();
        drop(rows);

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, filter: &FilterExpr) -> Result<usize> {
        let state = self.collection(collection)?;

        let mut staged = state.staged.write();
        let staged_before = staged.len();
        staged.retain(|row| !filter.matches(row));
        let staged_removed = staged_before - staged.len();
        drop(staged);

        let mut rows = state.rows.write();
        let before = rows.len();
        rows.retain(|_, row| !filter.matches(row));
        let removed = before - rows.len();
        drop(rows);

        Ok(removed + staged_removed)
    }

    async fn create_partition(&self, collection: &str, partition: &str) -> Result<()> {
        let state = self.collection(collection)?;
        state.partitions.write().insert(partition.to_string());
        Ok(())
    }

    async fn list_partitions(&self, collection: &str) -> Result<Vec<String>> {
        let state = self.collection(collection)?;
        let mut names: Vec<String> = state.partitions.read().iter().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn drop_partition(&self, collection: &str, partition: &str) -> Result<usize> {
        let state = self.collection(collection)?;
        if !state.partitions.write().remove(partition) {
            return Err(RagError::not_found(format!(
                "partition '{partition}' does not exist in '{collection}'"
            )));
        }
        let mut rows = state.rows.write();
        let before = rows.len();
        rows.retain(|_, row| row.partition.as_deref() != Some(partition));
        Ok(before - rows.len())
    }

    async fn partition_stats(&self, collection: &str) -> Result<Vec<PartitionStats>> {
        let state = self.collection(collection)?;
        let rows = state.rows.read();
        let mut counts: HashMap<String, usize> = state
            .partitions
            .read()
            .iter()
            .map(|p| (p.clone(), 0))
            .collect();
        for row in rows.values() {
            if let Some(p) = &row.partition {
                *counts.entry(p.clone()).or_insert(0) += 1;
            }
        }
        let mut stats: Vec<PartitionStats> = counts
            .into_iter()
            .map(|(name, entity_count)| PartitionStats { name, entity_count })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::select_index;
    use crate::schema::chunk_collection_schema;
    use serde_json::json;

    fn spec() -> IndexSpec {
        select_index(0, false, DistanceMetric::Cosine)
    }

    async fn backend_with_collection(dim: usize) -> InMemoryVectorBackend {
        let backend = InMemoryVectorBackend::new();
        let schema = chunk_collection_schema("documents", dim);
        backend.create_collection(&schema, &spec()).await.unwrap();
        backend
    }

    fn params() -> SearchParams {
        SearchParams {
            metric: DistanceMetric::Cosine,
            ef: Some(64),
            nprobe: None,
        }
    }

    #[tokio::test]
    async fn test_insert_requires_matching_dimension() {
        let backend = backend_with_collection(3).await;
        let bad = VectorRow::new("c1", vec![1.0, 0.0]);
        let err = backend.insert("documents", vec![bad]).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_search_sees_rows_only_after_flush() {
        let backend = backend_with_collection(2).await;
        backend.load_collection("documents").await.unwrap();

        backend
            .insert("documents", vec![VectorRow::new("c1", vec![1.0, 0.0])])
            .await
            .unwrap();

        let before = backend
            .search("documents", &[1.0, 0.0], 5, &params(), None, &[])
            .await
            .unwrap();
        assert!(before.is_empty());

        backend.flush("documents").await.unwrap();
        let after = backend
            .search("documents", &[1.0, 0.0], 5, &params(), None, &[])
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
        assert!(after[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_search_rejects_metric_mismatch() {
        let backend = backend_with_collection(2).await;
        backend.load_collection("documents").await.unwrap();
        let wrong = SearchParams {
            metric: DistanceMetric::L2,
            ef: Some(64),
            nprobe: None,
        };
        let err = backend
            .search("documents", &[1.0, 0.0], 5, &wrong, None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::IndexMismatch { .. }));
    }

    #[tokio::test]
    async fn test_search_requires_loaded_collection() {
        let backend = backend_with_collection(2).await;
        let err = backend
            .search("documents", &[1.0, 0.0], 5, &params(), None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_partition_scoped_search_eliminates_other_partitions() {
        let backend = backend_with_collection(2).await;
        backend.load_collection("documents").await.unwrap();
        backend
            .insert(
                "documents",
                vec![
                    VectorRow::new("a", vec![1.0, 0.0]).in_partition("user_alice"),
                    VectorRow::new("b", vec![1.0, 0.0]).in_partition("user_bob"),
                ],
            )
            .await
            .unwrap();
        backend.flush("documents").await.unwrap();

        let hits = backend
            .search(
                "documents",
                &[1.0, 0.0],
                5,
                &params(),
                None,
                &["user_alice".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].row.id, "a");
    }

    #[tokio::test]
    async fn test_delete_by_predicate_removes_staged_and_flushed() {
        let backend = backend_with_collection(2).await;
        backend.load_collection("documents").await.unwrap();
        backend
            .insert(
                "documents",
                vec![
                    VectorRow::new("a", vec![1.0, 0.0]).with_field("document_id", json!("d1")),
                    VectorRow::new("b", vec![0.0, 1.0]).with_field("document_id", json!("d2")),
                ],
            )
            .await
            .unwrap();
        backend.flush("documents").await.unwrap();
        backend
            .insert(
                "documents",
                vec![VectorRow::new("c", vec![0.5, 0.5]).with_field("document_id", json!("d1"))],
            )
            .await
            .unwrap();

        let deleted = backend
            .delete("documents", &FilterExpr::eq("document_id", "d1"))
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        backend.flush("documents").await.unwrap();
        let hits = backend
            .search("documents", &[1.0, 0.0], 10, &params(), None, &[])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].row.id, "b");
    }

    #[tokio::test]
    async fn test_l2_scores_are_higher_for_closer_rows() {
        let backend = InMemoryVectorBackend::new();
        let schema = chunk_collection_schema("l2docs", 2);
        let index = select_index(0, false, DistanceMetric::L2);
        backend.create_collection(&schema, &index).await.unwrap();
        backend.load_collection("l2docs").await.unwrap();
        backend
            .insert(
                "l2docs",
                vec![
                    VectorRow::new("near", vec![1.0, 0.0]),
                    VectorRow::new("far", vec![9.0, 9.0]),
                ],
            )
            .await
            .unwrap();
        backend.flush("l2docs").await.unwrap();

        let l2_params = SearchParams {
            metric: DistanceMetric::L2,
            ef: Some(64),
            nprobe: None,
        };
        let hits = backend
            .search("l2docs", &[1.0, 0.0], 2, &l2_params, None, &[])
            .await
            .unwrap();
        assert_eq!(hits[0].row.id, "near");
        assert!(hits[0].score > hits[1].score);
    }
}
