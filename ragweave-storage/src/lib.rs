//! # ragweave-storage
//!
//! Vector store layer: a backend client contract, a brute-force in-memory
//! backend, a fixed-size connection pool, and a collection-scoped store
//! that enforces dimensions and metric compatibility, selects index and
//! search parameters adaptively, and manages partitions.
//!
//! Index family follows corpus size (HNSW below 100k entities, IVF-PQ to
//! 1M, IVF-SQ8 beyond); search-time `ef`/`nprobe` follow query
//! complexity. Korean-optimized parameter sets widen both.

#![warn(missing_docs)]

/// Backend client contract
pub mod backend;

/// In-memory backend implementation
pub mod memory;

/// Index and search parameter selection
pub mod params;

/// Partition naming and management
pub mod partitions;

/// Fixed-size client pool
pub mod pool;

/// Collection schemas
pub mod schema;

/// High-level store
pub mod store;

/// Storage types
pub mod types;

pub use backend::VectorBackend;
pub use memory::InMemoryVectorBackend;
pub use pool::{ClientFactory, ConnectionPool, PoolGuard, SharedClientFactory};
pub use schema::{chunk_collection_schema, episode_collection_schema, CollectionSchema};
pub use store::{chunk_to_row, to_search_result, VectorStore};
pub use types::{
    CollectionInfo, CollectionStats, FilterExpr, HealthReport, IndexKind, IndexParams, IndexSpec,
    PartitionStats, ScoredRow, SearchParams, VectorRow,
};
