//! Environment variable overrides
//!
//! Each recognized `RAGWEAVE_*` variable overrides the corresponding
//! configuration field. Unparseable values are rejected rather than
//! silently ignored.

use std::str::FromStr;

use ragweave_core::error::{RagError, Result};
use ragweave_core::types::DistanceMetric;

use crate::RagweaveConfig;

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        RagError::invalid_argument(format!("environment variable {name} has invalid value '{raw}'"))
    })
}

/// Apply `RAGWEAVE_*` environment overrides to a config
///
/// # Errors
///
/// Returns `InvalidArgument` when a set variable cannot be parsed.
pub fn apply_env_overrides(config: &mut RagweaveConfig) -> Result<()> {
    if let Ok(raw) = std::env::var("RAGWEAVE_SPECULATIVE_TIMEOUT_MS") {
        config.router.speculative_timeout_ms = parse_var("RAGWEAVE_SPECULATIVE_TIMEOUT_MS", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_AGENTIC_TIMEOUT_MS") {
        config.router.agentic_timeout_ms = parse_var("RAGWEAVE_AGENTIC_TIMEOUT_MS", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_MAX_ITERATIONS") {
        config.engine.max_iterations = parse_var("RAGWEAVE_MAX_ITERATIONS", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_EMBEDDING_DIM") {
        config.vector.embedding_dim = parse_var("RAGWEAVE_EMBEDDING_DIM", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_VECTOR_METRIC") {
        config.vector.metric = raw.parse::<DistanceMetric>()?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_KOREAN_OPTIMIZATION") {
        config.vector.enable_korean_optimization = parse_var("RAGWEAVE_KOREAN_OPTIMIZATION", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_L1_TTL_S") {
        config.cache.l1_ttl_s = parse_var("RAGWEAVE_L1_TTL_S", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_L2_TTL_S") {
        config.cache.l2_ttl_s = parse_var("RAGWEAVE_L2_TTL_S", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_L2_MAX_SIZE") {
        config.cache.l2_max_size = parse_var("RAGWEAVE_L2_MAX_SIZE", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_ALERT_ERROR_RATE") {
        config.monitor.alert_error_rate = parse_var("RAGWEAVE_ALERT_ERROR_RATE", &raw)?;
    }
    if let Ok(raw) = std::env::var("RAGWEAVE_ALERT_P95_MS") {
        config.monitor.alert_p95_ms = parse_var("RAGWEAVE_ALERT_P95_MS", &raw)?;
    }

    Ok(())
}
