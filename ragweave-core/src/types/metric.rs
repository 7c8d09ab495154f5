//! Similarity metric identity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Similarity metric of a vector collection
///
/// Chosen at collection creation and immutable afterwards. The metric used
/// to build the index must equal the metric used at search time; the store
/// rejects mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity (higher is better)
    Cosine,
    /// Euclidean distance (converted so higher is better)
    L2,
    /// Inner product (higher is better)
    Ip,
}

impl DistanceMetric {
    /// Stable string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
            Self::Ip => "ip",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" => Ok(Self::L2),
            "ip" => Ok(Self::Ip),
            other => Err(RagError::invalid_argument(format!(
                "unknown vector metric '{other}', expected cosine, l2, or ip"
            ))),
        }
    }
}
