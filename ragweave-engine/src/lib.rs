//! # ragweave-engine
//!
//! The hybrid query execution core: a fast, low-confidence speculative
//! path and a slower, high-confidence agentic path run under a router
//! that coordinates them with timeouts, streams progressive updates, and
//! merges outcomes by completion and confidence. Around them sit the
//! episode store for warm starts, the performance monitor, and the
//! process-scoped service container.

#![warn(missing_docs)]

/// Agentic reasoning engine
pub mod agentic;

/// Service container
pub mod container;

/// Episode store
pub mod episodes;

/// Generation wrappers and prompts
pub mod generation;

/// Performance monitor
pub mod monitor;

/// Hybrid query router
pub mod router;

/// Speculative path
pub mod speculative;

/// Test doubles
pub mod testing;

pub use agentic::{
    AgenticEngine, AgenticResult, EngineOutcome, GenerationEvaluator, ObservationFilter,
    RetrievalEvaluator, RetrieverSet,
};
pub use container::{ContainerDeps, ServiceContainer};
pub use episodes::{EpisodeStore, InMemoryEpisodeStore, VectorEpisodeStore};
pub use generation::RetryingGenerator;
pub use monitor::{
    Alert, ConfidenceSummary, PathKind, PerformanceMonitor, RequestEvent, TimingSummary,
};
pub use router::HybridQueryRouter;
pub use speculative::SpeculativeProcessor;
