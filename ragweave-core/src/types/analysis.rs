//! Query analysis output

use serde::{Deserialize, Serialize};

use super::query::QueryMode;

/// Coarse query classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryType {
    /// Lookup-style question with a short answer
    Factual,
    /// Requires comparison, causality, or evaluation
    Analytical,
    /// Explicitly sequenced, multi-part request
    MultiStep,
    /// Open-ended or chit-chat
    Conversational,
}

impl QueryType {
    /// Stable string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Analytical => "analytical",
            Self::MultiStep => "multi-step",
            Self::Conversational => "conversational",
        }
    }
}

/// Result of analyzing a query's text
///
/// Pure function of the text: the same input always produces the same
/// analysis, so callers may cache it freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// Complexity score in `[0, 1]`
    pub complexity: f32,
    /// Classified query type
    pub query_type: QueryType,
    /// Whether answering needs reasoning beyond lookup
    pub requires_reasoning: bool,
    /// Whether answering likely needs more than one source
    pub requires_multiple_sources: bool,
    /// Rough token estimate including prompt overhead
    pub estimated_tokens: usize,
    /// Salient non-stopword terms, most significant first
    pub keywords: Vec<String>,
    /// Capitalized-phrase entities
    pub entities: Vec<String>,
    /// Recommended execution mode for this query
    pub recommended_mode: QueryMode,
}
