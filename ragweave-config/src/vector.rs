//! Vector store configuration

use serde::{Deserialize, Serialize};

use ragweave_core::error::{RagError, Result};
use ragweave_core::types::DistanceMetric;

/// Vector store and connection pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Collection holding document chunks
    pub collection: String,
    /// Collection holding agentic episodes
    pub episode_collection: String,
    /// Embedding dimension for new collections
    pub embedding_dim: usize,
    /// Similarity metric for new collections
    pub metric: DistanceMetric,
    /// Use Korean-tuned index and search parameters
    pub enable_korean_optimization: bool,
    /// Fixed pool size for backend client handles
    pub pool_size: usize,
    /// Idle clients are reaped after this many seconds
    pub pool_idle_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            collection: "documents".to_string(),
            episode_collection: "episodes".to_string(),
            embedding_dim: 768,
            metric: DistanceMetric::Cosine,
            enable_korean_optimization: false,
            pool_size: 8,
            pool_idle_secs: 300,
        }
    }
}

impl VectorStoreConfig {
    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(RagError::invalid_argument(
                "vector.embedding_dim must be positive",
            ));
        }
        if self.pool_size == 0 {
            return Err(RagError::invalid_argument("vector.pool_size must be positive"));
        }
        if self.collection.is_empty() || self.episode_collection.is_empty() {
            return Err(RagError::invalid_argument(
                "vector collection names must be non-empty",
            ));
        }
        Ok(())
    }
}
