//! # ragweave-config
//!
//! Layered configuration for the ragweave query engine: serde-default
//! structs per subsystem, TOML loading, `RAGWEAVE_*` environment
//! overrides, and validation that rejects out-of-range values before any
//! service is constructed.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

use ragweave_core::error::{RagError, Result};

mod cache;
mod engine;
mod env;
mod mcp;
mod monitor;
mod router;
mod vector;

pub use cache::CacheConfig;
pub use engine::EngineConfig;
pub use env::apply_env_overrides;
pub use mcp::{McpConfig, McpServerConfig};
pub use monitor::MonitorConfig;
pub use router::RouterConfig;
pub use vector::VectorStoreConfig;

/// Root configuration for a ragweave deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagweaveConfig {
    /// Hybrid query router timeouts
    pub router: RouterConfig,
    /// Agentic engine tunables
    pub engine: EngineConfig,
    /// Vector store and pool settings
    pub vector: VectorStoreConfig,
    /// Two-tier cache sizing
    pub cache: CacheConfig,
    /// MCP server launch parameters
    pub mcp: McpConfig,
    /// Monitor windows and alert thresholds
    pub monitor: MonitorConfig,
}

impl RagweaveConfig {
    /// Parse a TOML document into a config
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on malformed TOML.
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| RagError::invalid_argument(format!("config parse error: {e}")))
    }

    /// Build the effective config: defaults, then TOML, then environment
    /// overrides, then validation
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for parse or validation failures.
    pub fn load(raw_toml: Option<&str>) -> Result<Self> {
        let mut config = match raw_toml {
            Some(raw) => Self::from_toml(raw)?,
            None => Self::default(),
        };
        apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first section's `InvalidArgument` failure.
    pub fn validate(&self) -> Result<()> {
        self.router.validate()?;
        self.engine.validate()?;
        self.vector.validate()?;
        self.cache.validate()?;
        self.mcp.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_core::types::DistanceMetric;

    #[test]
    fn test_defaults_validate() {
        let config = RagweaveConfig::default();
        config.validate().unwrap();
        assert_eq!(config.engine.max_iterations, 3);
        assert_eq!(config.vector.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn test_toml_roundtrip() {
        let raw = r#"
            [router]
            speculative_timeout_ms = 500
            agentic_timeout_ms = 10000

            [vector]
            embedding_dim = 384
            metric = "l2"
            enable_korean_optimization = true

            [mcp.servers.search_server]
            command = "uvx"
            args = ["mcp-server-search"]
        "#;

        let config = RagweaveConfig::from_toml(raw).unwrap();
        assert_eq!(config.router.speculative_timeout_ms, 500);
        assert_eq!(config.vector.embedding_dim, 384);
        assert_eq!(config.vector.metric, DistanceMetric::L2);
        assert!(config.vector.enable_korean_optimization);
        assert_eq!(
            config.mcp.servers.get("search_server").unwrap().command,
            "uvx"
        );
        // Sections not present keep their defaults
        assert_eq!(config.cache.l1_ttl_s, 300);
    }

    #[test]
    fn test_bad_metric_rejected() {
        let raw = r#"
            [vector]
            metric = "hamming"
        "#;
        assert!(RagweaveConfig::from_toml(raw).is_err());
    }

    #[test]
    fn test_zero_embedding_dim_rejected() {
        let mut config = RagweaveConfig::default();
        config.vector.embedding_dim = 0;
        assert!(matches!(
            config.validate(),
            Err(RagError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_l2_ttl_shorter_than_l1_rejected() {
        let mut config = RagweaveConfig::default();
        config.cache.l1_ttl_s = 600;
        config.cache.l2_ttl_s = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_mcp_command_rejected() {
        let mut config = RagweaveConfig::default();
        config.mcp.servers.insert(
            "broken".to_string(),
            McpServerConfig {
                command: String::new(),
                args: Vec::new(),
                env: Default::default(),
            },
        );
        assert!(config.validate().is_err());
    }
}
