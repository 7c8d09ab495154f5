//! # ragweave-rag
//!
//! Retrieval infrastructure around the vector store and the MCP
//! multiplexer:
//! - Regex-based query analysis (complexity, type, mode recommendation)
//! - Adaptive strategy selection with rolling performance windows
//! - Specialist retrievers (vector, web, local data) behind the uniform
//!   [`ragweave_core::traits::Retriever`] trait
//! - Embedding providers with an LRU cache
//! - The two-tier (L1 in-process, L2 remote) search cache

#![warn(missing_docs)]

/// Query analysis
pub mod analyzer;

/// Two-tier cache
pub mod cache;

/// Embedding providers and cache
pub mod embedding;

/// Result reranking
pub mod rerank;

/// Specialist retrievers
pub mod retriever;

/// Adaptive strategy selection
pub mod strategy;

pub use analyzer::QueryAnalyzer;
pub use cache::{CacheMetricsSnapshot, CacheType, InMemoryRemoteCache, RemoteCache, TieredCache};
pub use embedding::{CachedEmbedder, EmbeddingCache, MockEmbedder};
pub use rerank::{LexicalReranker, Reranker};
pub use retriever::{LocalDataRetriever, VectorRetriever, VectorRetrieverConfig, WebRetriever};
pub use strategy::{StrategySelector, StrategyStats, StrategyTracker};
