//! Agentic reasoning engine configuration

use serde::{Deserialize, Serialize};

use ragweave_core::error::{RagError, Result};

/// Tunables for the agentic reasoning loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard cap on iterations; zero yields an immediate budget-exhausted
    /// result
    pub max_iterations: usize,
    /// Minimum evaluator confidence before a retrieval is considered
    /// sufficient
    pub relevance_threshold: f32,
    /// Minimum evaluator confidence before a generation is accepted
    pub support_threshold: f32,
    /// Cosine similarity above which a past episode donates its plan
    pub warm_start_similarity: f32,
    /// Similarity to already-accepted context above which an observation
    /// is dropped as redundant
    pub observation_novelty_threshold: f32,
    /// Confidence boost applied when a corrective action succeeded
    pub correction_confidence_boost: f32,
    /// Maximum web results folded in by a corrective web search
    pub web_fallback_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            relevance_threshold: 0.6,
            support_threshold: 0.7,
            warm_start_similarity: 0.92,
            observation_novelty_threshold: 0.85,
            correction_confidence_boost: 0.1,
            web_fallback_results: 5,
        }
    }
}

impl EngineConfig {
    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on out-of-range values.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("engine.relevance_threshold", self.relevance_threshold),
            ("engine.support_threshold", self.support_threshold),
            ("engine.warm_start_similarity", self.warm_start_similarity),
            (
                "engine.observation_novelty_threshold",
                self.observation_novelty_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RagError::invalid_argument(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if !(0.0..=0.5).contains(&self.correction_confidence_boost) {
            return Err(RagError::invalid_argument(
                "engine.correction_confidence_boost must be in [0, 0.5]",
            ));
        }
        Ok(())
    }
}
