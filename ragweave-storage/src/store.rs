//! High-level vector store over a pooled backend
//!
//! One [`VectorStore`] manages one collection: lifecycle, dimension
//! validation, the loaded-once latch, adaptive search parameters, and
//! predicate deletes. The episode collection gets its own store sharing
//! the same pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ragweave_core::error::{RagError, Result};
use ragweave_core::types::{ChunkRecord, DistanceMetric, SearchResult};

use crate::params::{adaptive_search_params, select_index};
use crate::pool::ConnectionPool;
use crate::schema::CollectionSchema;
use crate::types::{CollectionStats, FilterExpr, HealthReport, ScoredRow, VectorRow};

/// Pooled, collection-scoped vector store
pub struct VectorStore {
    pool: Arc<ConnectionPool>,
    collection: String,
    dimension: usize,
    metric: DistanceMetric,
    korean: bool,
    loaded: AtomicBool,
    load_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("collection", &self.collection)
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Create a store for one collection
    pub fn new(
        pool: Arc<ConnectionPool>,
        collection: impl Into<String>,
        dimension: usize,
        metric: DistanceMetric,
        korean: bool,
    ) -> Self {
        Self {
            pool,
            collection: collection.into(),
            dimension,
            metric,
            korean,
            loaded: AtomicBool::new(false),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Collection name this store manages
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embedding dimension this store enforces
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Similarity metric of the collection
    #[must_use]
    pub const fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Shared pool handle
    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Create the collection if missing, with an index chosen for an
    /// initially empty corpus
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the schema dimension disagrees with
    /// the store's configured dimension.
    pub async fn ensure_collection(
        &self,
        schema: &CollectionSchema,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if schema.dimension() != Some(self.dimension) {
            return Err(RagError::invalid_argument(format!(
                "schema dimension {:?} does not match configured dimension {}",
                schema.dimension(),
                self.dimension
            )));
        }
        let client = self.pool.checkout(cancel).await?;
        if client.has_collection(&self.collection).await? {
            debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }
        let index = select_index(0, self.korean, self.metric);
        info!(
            collection = %self.collection,
            index = index.kind.as_str(),
            "creating collection"
        );
        client.create_collection(schema, &index).await
    }

    /// Insert chunk records, optionally into a partition, and flush so a
    /// follow-up search observes the write
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty input or dimension mismatches.
    pub async fn insert_chunks(
        &self,
        chunks: &[ChunkRecord],
        partition: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Err(RagError::invalid_argument("insert requires at least one chunk"));
        }
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.embedding.len() != self.dimension {
                return Err(RagError::invalid_argument(format!(
                    "chunk {i} has dimension {}, expected {}",
                    chunk.embedding.len(),
                    self.dimension
                )));
            }
            if chunk.id.is_empty() || chunk.document_id.is_empty() {
                return Err(RagError::invalid_argument(format!(
                    "chunk {i} is missing id or document_id"
                )));
            }
        }

        let client = self.pool.checkout(cancel).await?;
        if let Some(partition) = partition {
            client.create_partition(&self.collection, partition).await?;
        }

        let rows: Vec<VectorRow> = chunks
            .iter()
            .map(|chunk| {
                let mut row = chunk_to_row(chunk);
                if let Some(partition) = partition {
                    row = row.in_partition(partition);
                }
                row
            })
            .collect();

        debug!(
            collection = %self.collection,
            count = rows.len(),
            "inserting chunk embeddings"
        );
        let ids = client.insert(&self.collection, rows).await?;
        client.flush(&self.collection).await?;
        Ok(ids)
    }

    /// Insert pre-built rows (e.g. episodes) and flush
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty input or dimension mismatches.
    pub async fn insert_rows(
        &self,
        rows: Vec<VectorRow>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if rows.is_empty() {
            return Err(RagError::invalid_argument("insert requires at least one row"));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.embedding.len() != self.dimension {
                return Err(RagError::invalid_argument(format!(
                    "row {i} has dimension {}, expected {}",
                    row.embedding.len(),
                    self.dimension
                )));
            }
        }
        let client = self.pool.checkout(cancel).await?;
        let ids = client.insert(&self.collection, rows).await?;
        client.flush(&self.collection).await?;
        Ok(ids)
    }

    /// Similarity search with complexity-adaptive parameters
    ///
    /// Reads the collection's index to pick compatible search params; a
    /// metric differing from the store's configured metric is rejected
    /// with `IndexMismatch` rather than silently defaulted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed input, `IndexMismatch` for
    /// metric disagreement.
    pub async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        query_complexity: f32,
        filter: Option<&FilterExpr>,
        partitions: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRow>> {
        if embedding.len() != self.dimension {
            return Err(RagError::invalid_argument(format!(
                "query embedding dimension {} does not match expected {}",
                embedding.len(),
                self.dimension
            )));
        }
        if top_k == 0 {
            return Err(RagError::invalid_argument("top_k must be positive"));
        }

        self.ensure_loaded(cancel).await?;

        let client = self.pool.checkout(cancel).await?;
        let info = client.describe_collection(&self.collection).await?;
        let index = info.index.ok_or_else(|| {
            RagError::internal(format!("collection '{}' has no index", self.collection))
        })?;
        if index.metric != self.metric {
            return Err(RagError::index_mismatch(format!(
                "collection '{}' index metric {} does not match configured {}",
                self.collection, index.metric, self.metric
            )));
        }

        let params = adaptive_search_params(
            index.kind,
            info.entity_count,
            query_complexity,
            self.korean,
            self.metric,
        );
        debug!(
            collection = %self.collection,
            index = index.kind.as_str(),
            entities = info.entity_count,
            complexity = query_complexity,
            "adaptive search"
        );

        client
            .search(&self.collection, embedding, top_k, &params, filter, partitions)
            .await
    }

    /// Delete all rows matching a predicate; flushed before returning
    pub async fn delete(
        &self,
        filter: &FilterExpr,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let client = self.pool.checkout(cancel).await?;
        let deleted = client.delete(&self.collection, filter).await?;
        client.flush(&self.collection).await?;
        Ok(deleted)
    }

    /// Delete every chunk belonging to a document; atomic from the
    /// caller's perspective (single filtered delete, flushed)
    pub async fn delete_document(
        &self,
        document_id: &str,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if document_id.is_empty() {
            return Err(RagError::invalid_argument("document_id cannot be empty"));
        }
        let deleted = self
            .delete(&FilterExpr::eq("document_id", document_id), cancel)
            .await?;
        if deleted == 0 {
            warn!(document_id, "no chunks found for document");
        } else {
            info!(document_id, deleted, "deleted document chunks");
        }
        Ok(deleted)
    }

    /// Connection, collection, and entity-count health probe
    ///
    /// Failures are folded into the report rather than raised.
    pub async fn health_check(&self, cancel: &CancellationToken) -> HealthReport {
        let client = match self.pool.checkout(cancel).await {
            Ok(client) => client,
            Err(e) => {
                return HealthReport {
                    connected: false,
                    collection_exists: false,
                    entity_count: None,
                    detail: format!("pool checkout failed: {e}"),
                };
            }
        };
        if let Err(e) = client.ping().await {
            return HealthReport {
                connected: false,
                collection_exists: false,
                entity_count: None,
                detail: format!("ping failed: {e}"),
            };
        }
        match client.describe_collection(&self.collection).await {
            Ok(info) => HealthReport {
                connected: true,
                collection_exists: true,
                entity_count: Some(info.entity_count),
                detail: "healthy".to_string(),
            },
            Err(RagError::NotFound { .. }) => HealthReport {
                connected: true,
                collection_exists: false,
                entity_count: None,
                detail: format!("collection '{}' does not exist", self.collection),
            },
            Err(e) => HealthReport {
                connected: true,
                collection_exists: false,
                entity_count: None,
                detail: format!("describe failed: {e}"),
            },
        }
    }

    /// Collection statistics with an index-optimization verdict for the
    /// current corpus size
    pub async fn stats(&self, cancel: &CancellationToken) -> Result<CollectionStats> {
        let client = self.pool.checkout(cancel).await?;
        let info = client.describe_collection(&self.collection).await?;
        let recommended = select_index(info.entity_count, self.korean, self.metric);
        let is_optimized = info.index.is_some_and(|current| current == recommended);
        Ok(CollectionStats {
            name: self.collection.clone(),
            entity_count: info.entity_count,
            current_index: info.index,
            recommended_index: recommended,
            is_optimized,
        })
    }

    /// Load the collection into memory exactly once
    ///
    /// The first search after cold start serializes on the load lock;
    /// later searches take the fast path on the flag.
    async fn ensure_loaded(&self, cancel: &CancellationToken) -> Result<()> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.load_lock.lock().await;
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let client = self.pool.checkout(cancel).await?;
        client.load_collection(&self.collection).await?;
        self.loaded.store(true, Ordering::Release);
        info!(collection = %self.collection, "collection loaded into memory");
        Ok(())
    }
}

fn optional_field(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |v| json!(v))
}

/// Convert a chunk record into a backend row
#[must_use]
pub fn chunk_to_row(chunk: &ChunkRecord) -> VectorRow {
    VectorRow::new(chunk.id.clone(), chunk.embedding.clone())
        .with_field("document_id", json!(chunk.document_id))
        .with_field("knowledgebase_id", json!(chunk.knowledgebase_id))
        .with_field("text", json!(chunk.text))
        .with_field("chunk_index", json!(chunk.chunk_index))
        .with_field("document_name", json!(chunk.document_name))
        .with_field("file_type", json!(chunk.file_type))
        .with_field("upload_date", json!(chunk.upload_date))
        .with_field("author", optional_field(&chunk.author))
        .with_field(
            "creation_date",
            chunk.creation_date.map_or(Value::Null, |v| json!(v)),
        )
        .with_field("language", optional_field(&chunk.language))
        .with_field("keywords", optional_field(&chunk.keywords))
}

/// Convert a scored backend row into a search result
#[must_use]
pub fn to_search_result(scored: ScoredRow) -> SearchResult {
    let ScoredRow { row, score } = scored;
    let get_str = |name: &str| -> String {
        row.fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let chunk_index = row
        .fields
        .get("chunk_index")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let mut metadata: HashMap<String, Value> = HashMap::new();
    for key in ["file_type", "upload_date", "language", "author"] {
        if let Some(value) = row.fields.get(key) {
            if !value.is_null() {
                metadata.insert(key.to_string(), value.clone());
            }
        }
    }
    if let Some(partition) = &row.partition {
        metadata.insert("partition".to_string(), json!(partition));
    }

    SearchResult {
        id: row.id,
        document_id: get_str("document_id"),
        text: get_str("text"),
        score,
        document_name: get_str("document_name"),
        chunk_index,
        metadata,
    }
}
