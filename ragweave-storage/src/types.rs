//! Vector storage types: index specs, search params, rows, filters

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ragweave_core::types::DistanceMetric;

/// ANN index families supported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Graph index for small corpora
    Hnsw,
    /// Quantized inverted file for medium corpora
    IvfPq,
    /// Scalar-quantized inverted file for large corpora
    IvfSq8,
}

impl IndexKind {
    /// Stable string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hnsw => "HNSW",
            Self::IvfPq => "IVF_PQ",
            Self::IvfSq8 => "IVF_SQ8",
        }
    }
}

/// Build-time parameters per index family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "index", rename_all = "snake_case")]
pub enum IndexParams {
    /// HNSW graph parameters
    Hnsw {
        /// Bi-directional links per node
        m: usize,
        /// Construction-time candidate list size
        ef_construction: usize,
    },
    /// IVF-PQ parameters
    IvfPq {
        /// Cluster count
        nlist: usize,
        /// Sub-quantizer count
        m: usize,
        /// Bits per sub-quantizer
        nbits: usize,
    },
    /// IVF-SQ8 parameters
    IvfSq8 {
        /// Cluster count
        nlist: usize,
    },
}

/// A concrete index choice: family, metric, and build parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index family
    pub kind: IndexKind,
    /// Metric the index was built with
    pub metric: DistanceMetric,
    /// Build parameters
    pub params: IndexParams,
}

/// Search-time parameters
///
/// `metric` must equal the metric of the index being probed; the store
/// rejects mismatches before issuing the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Metric expected at search time
    pub metric: DistanceMetric,
    /// HNSW candidate list size
    pub ef: Option<usize>,
    /// IVF probe count
    pub nprobe: Option<usize>,
}

/// One row as the backend stores it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRow {
    /// Primary key
    pub id: String,
    /// Partition the row lives in, when partitioned
    #[serde(default)]
    pub partition: Option<String>,
    /// Embedding vector
    pub embedding: Vec<f32>,
    /// Scalar fields keyed by schema field name
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl VectorRow {
    /// Create a row with no scalar fields
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            partition: None,
            embedding,
            fields: HashMap::new(),
        }
    }

    /// Set a scalar field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Assign the row to a partition
    #[must_use]
    pub fn in_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }
}

/// A row with its similarity score; higher is always better
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRow {
    /// The matching row
    pub row: VectorRow,
    /// Raw similarity under the collection metric (L2 distances are
    /// converted so that higher is better)
    pub score: f32,
}

/// Scalar-field predicate applied before ANN probing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    /// Field equals value
    Eq(String, Value),
    /// All sub-predicates hold
    And(Vec<FilterExpr>),
}

impl FilterExpr {
    /// Equality predicate on a string field
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// Whether a row satisfies the predicate
    #[must_use]
    pub fn matches(&self, row: &VectorRow) -> bool {
        match self {
            Self::Eq(field, value) => row.fields.get(field) == Some(value),
            Self::And(parts) => parts.iter().all(|p| p.matches(row)),
        }
    }
}

/// Metadata describing a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name
    pub name: String,
    /// Embedding dimension fixed at creation
    pub dimension: usize,
    /// Index spec, when an index has been built
    pub index: Option<IndexSpec>,
    /// Flushed entity count
    pub entity_count: usize,
    /// Whether the collection is loaded for search
    pub loaded: bool,
}

/// Health probe result for the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Backend reachable
    pub connected: bool,
    /// Primary collection exists
    pub collection_exists: bool,
    /// Flushed entity count, when the collection exists
    pub entity_count: Option<usize>,
    /// Short diagnostic detail
    pub detail: String,
}

/// Collection statistics with an index-optimization verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Collection name
    pub name: String,
    /// Flushed entity count
    pub entity_count: usize,
    /// Index currently in place
    pub current_index: Option<IndexSpec>,
    /// Index recommended for the current corpus size
    pub recommended_index: IndexSpec,
    /// Whether current matches recommended
    pub is_optimized: bool,
}

/// Per-partition entity count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionStats {
    /// Partition name
    pub name: String,
    /// Flushed entity count within the partition
    pub entity_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_eq_matches_field() {
        let row = VectorRow::new("c1", vec![0.0]).with_field("document_id", json!("doc-9"));
        assert!(FilterExpr::eq("document_id", "doc-9").matches(&row));
        assert!(!FilterExpr::eq("document_id", "doc-8").matches(&row));
    }

    #[test]
    fn test_filter_and_requires_all() {
        let row = VectorRow::new("c1", vec![0.0])
            .with_field("document_id", json!("doc-9"))
            .with_field("language", json!("ko"));
        let both = FilterExpr::And(vec![
            FilterExpr::eq("document_id", "doc-9"),
            FilterExpr::eq("language", "ko"),
        ]);
        let wrong = FilterExpr::And(vec![
            FilterExpr::eq("document_id", "doc-9"),
            FilterExpr::eq("language", "en"),
        ]);
        assert!(both.matches(&row));
        assert!(!wrong.matches(&row));
    }
}
