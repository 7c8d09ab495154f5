//! # ragweave-core
//!
//! Core types, error taxonomy, and capability traits for the ragweave
//! retrieval-augmented question-answering engine.
//!
//! This crate defines:
//! - The closed error set ([`error::RagError`], [`error::ErrorKind`]) used
//!   for routing decisions and metrics keys
//! - The data model: queries, analyses, chunks, search results,
//!   assessments, episodes, strategies, and routed responses
//! - Capability traits at subsystem seams: [`traits::Retriever`],
//!   [`traits::Embedder`], [`traits::Generator`]
//! - Vector-math helpers shared by storage and retrieval

#![warn(missing_docs)]

/// Error taxonomy and Result alias
pub mod error;

/// Vector-math helpers
pub mod math;

/// Capability traits
pub mod traits;

/// Shared data model
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{ErrorKind, RagError, Result};
    pub use crate::traits::{
        Embedder, GenerationRequest, Generator, HealthStatus, Retriever, SearchRequest,
    };
    pub use crate::types::{
        Assessment, ChunkRecord, CorrectionAction, DistanceMetric, Episode, GenerationAssessment, Query,
        QueryAnalysis, QueryConstraints, QueryMode, QueryResponse, QueryType, ResponseStatus,
        RetrievalAssessment, RetrievalQuality, RouteUpdate, RoutedError, RoutedResult,
        SearchResult, StrategyKind, StrategyParameters, StrategySelection, SupportLevel,
        UsefulnessLevel,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
