//! Backend client contract
//!
//! The store treats the vector database as a black box behind this trait.
//! Production deployments point it at a remote store's client library; the
//! in-memory backend in [`crate::memory`] implements the same contract for
//! tests and small local corpora.

use async_trait::async_trait;

use ragweave_core::error::Result;

use crate::schema::CollectionSchema;
use crate::types::{
    CollectionInfo, FilterExpr, IndexSpec, PartitionStats, ScoredRow, SearchParams, VectorRow,
};

/// Client contract for a vector database
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Verify the connection is alive
    async fn ping(&self) -> Result<()>;

    /// Whether a collection exists
    async fn has_collection(&self, collection: &str) -> Result<bool>;

    /// Create a collection with its index; a no-op when it already exists
    async fn create_collection(&self, schema: &CollectionSchema, index: &IndexSpec) -> Result<()>;

    /// Describe a collection
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown collections.
    async fn describe_collection(&self, collection: &str) -> Result<CollectionInfo>;

    /// Drop a collection and all its rows
    async fn drop_collection(&self, collection: &str) -> Result<()>;

    /// Load a collection for search; idempotent
    async fn load_collection(&self, collection: &str) -> Result<()>;

    /// Insert rows; visible to search only after [`Self::flush`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when a row's embedding dimension does not
    /// match the collection dimension.
    async fn insert(&self, collection: &str, rows: Vec<VectorRow>) -> Result<Vec<String>>;

    /// Make pending writes visible to search
    async fn flush(&self, collection: &str) -> Result<()>;

    /// Similarity search
    ///
    /// Partition-aware: rows outside `partitions` (when non-empty) and rows
    /// failing `filter` are eliminated before ANN probing.
    ///
    /// # Errors
    ///
    /// Returns `IndexMismatch` when `params.metric` differs from the
    /// collection metric.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        params: &SearchParams,
        filter: Option<&FilterExpr>,
        partitions: &[String],
    ) -> Result<Vec<ScoredRow>>;

    /// Delete all rows matching the predicate, flush, and return the count
    async fn delete(&self, collection: &str, filter: &FilterExpr) -> Result<usize>;

    /// Create a partition; a no-op when it already exists
    async fn create_partition(&self, collection: &str, partition: &str) -> Result<()>;

    /// List partitions
    async fn list_partitions(&self, collection: &str) -> Result<Vec<String>>;

    /// Drop a partition and return how many rows it held
    async fn drop_partition(&self, collection: &str, partition: &str) -> Result<usize>;

    /// Per-partition entity counts
    async fn partition_stats(&self, collection: &str) -> Result<Vec<PartitionStats>>;
}
