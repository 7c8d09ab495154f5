//! Retrieval strategy identity and parameters

use serde::{Deserialize, Serialize};

/// Closed set of retrieval/generation strategies
///
/// Tagged variants rather than trait objects so the selector and the
/// monitor can key performance windows off a finite set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Single vector search plus generation
    Direct,
    /// Vector plus keyword search with fused scores
    Hybrid,
    /// Self-RAG loop with retrieval and generation assessment
    SelfReflective,
    /// Corrective RAG with refine/web/combine fallbacks
    Corrective,
    /// Decompose into hops, retrieve per hop
    MultiHop,
}

impl StrategyKind {
    /// Stable string form used in responses and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Hybrid => "hybrid",
            Self::SelfReflective => "self_reflective",
            Self::Corrective => "corrective",
            Self::MultiHop => "multi_hop",
        }
    }

    /// All strategies, for window initialization and stats surfaces
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Direct,
            Self::Hybrid,
            Self::SelfReflective,
            Self::Corrective,
            Self::MultiHop,
        ]
    }
}

/// Execution parameters attached to a strategy selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParameters {
    /// Result count per retrieval
    pub top_k: usize,
    /// Hard cap on agentic iterations
    pub max_iterations: usize,
    /// Hop budget for multi-hop strategies
    pub max_hops: usize,
    /// Whether web fallback is permitted
    pub enable_web: bool,
    /// Generation temperature
    pub temperature: f32,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            top_k: 10,
            max_iterations: 3,
            max_hops: 1,
            enable_web: false,
            temperature: 0.7,
        }
    }
}

/// A strategy choice together with the reasoning behind it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySelection {
    /// Chosen strategy
    pub strategy: StrategyKind,
    /// Selector confidence in the choice
    pub confidence: f32,
    /// Human-readable selection rationale
    pub reasoning: String,
    /// Parameters for executing the strategy
    pub parameters: StrategyParameters,
}
