//! Hybrid query router configuration

use serde::{Deserialize, Serialize};

use ragweave_core::error::{RagError, Result};

/// Timeouts governing the two execution paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Deadline for the speculative path in milliseconds
    ///
    /// Zero in balanced mode skips the speculative path entirely and runs
    /// agentic-only.
    pub speculative_timeout_ms: u64,
    /// Deadline for the agentic path in milliseconds
    pub agentic_timeout_ms: u64,
    /// Minimum speculative confidence for an interim emission
    pub interim_confidence_floor: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            speculative_timeout_ms: 2_000,
            agentic_timeout_ms: 30_000,
            interim_confidence_floor: 0.3,
        }
    }
}

impl RouterConfig {
    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.agentic_timeout_ms == 0 {
            return Err(RagError::invalid_argument(
                "router.agentic_timeout_ms must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.interim_confidence_floor) {
            return Err(RagError::invalid_argument(
                "router.interim_confidence_floor must be in [0, 1]",
            ));
        }
        Ok(())
    }
}
