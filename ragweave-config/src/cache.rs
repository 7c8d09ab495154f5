//! Two-tier cache configuration

use serde::{Deserialize, Serialize};

use ragweave_core::error::{RagError, Result};

/// Sizing and TTLs for the L1 in-process and L2 remote cache tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// L1 entry time-to-live in seconds
    pub l1_ttl_s: u64,
    /// Fixed per-cache-type L1 capacity
    pub l1_capacity: usize,
    /// L2 entry time-to-live in seconds
    pub l2_ttl_s: u64,
    /// Maximum number of L2 entries
    pub l2_max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_ttl_s: 300,
            l1_capacity: 256,
            l2_ttl_s: 3_600,
            l2_max_size: 10_000,
        }
    }
}

impl CacheConfig {
    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.l1_capacity == 0 {
            return Err(RagError::invalid_argument("cache.l1_capacity must be positive"));
        }
        if self.l2_max_size == 0 {
            return Err(RagError::invalid_argument("cache.l2_max_size must be positive"));
        }
        if self.l2_ttl_s < self.l1_ttl_s {
            return Err(RagError::invalid_argument(
                "cache.l2_ttl_s must be at least cache.l1_ttl_s",
            ));
        }
        Ok(())
    }
}
