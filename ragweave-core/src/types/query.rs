//! Inbound query types
//!
//! A [`Query`] is immutable once submitted: the router and both execution
//! paths only ever read it.

use serde::{Deserialize, Serialize};

/// Requested execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Speculative path only, hard latency bound
    Fast,
    /// Both paths in parallel, interim then final emission
    Balanced,
    /// Agentic path only
    Deep,
}

impl QueryMode {
    /// Stable string form used in metrics labels
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Deep => "deep",
        }
    }
}

/// Caller-supplied constraints that bias strategy selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConstraints {
    /// Prefer latency over depth: caps `top_k` and downgrades reflective
    /// strategies to hybrid
    pub fast_mode: bool,
    /// Prefer accuracy over latency: upgrades direct retrieval to
    /// self-reflective
    pub high_accuracy: bool,
    /// Explicit result-count override
    pub top_k: Option<usize>,
    /// Restrict search to these collection partitions
    pub partitions: Vec<String>,
    /// Language hint (e.g. "ko") forwarded to retrieval
    pub language: Option<String>,
}

/// A natural-language query submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Query text
    pub text: String,
    /// Optional conversation session
    pub session_id: Option<String>,
    /// Requested execution mode
    pub mode: QueryMode,
    /// Selection-biasing constraints
    #[serde(default)]
    pub constraints: QueryConstraints,
}

impl Query {
    /// Create a query with default constraints
    pub fn new(text: impl Into<String>, mode: QueryMode) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            mode,
            constraints: QueryConstraints::default(),
        }
    }

    /// Attach a session identifier
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Replace the constraint set
    #[must_use]
    pub fn with_constraints(mut self, constraints: QueryConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serde_lowercase() {
        let json = serde_json::to_string(&QueryMode::Balanced).unwrap();
        assert_eq!(json, "\"balanced\"");
        let mode: QueryMode = serde_json::from_str("\"deep\"").unwrap();
        assert_eq!(mode, QueryMode::Deep);
    }

    #[test]
    fn test_query_defaults() {
        let query = Query::new("What is the capital of France?", QueryMode::Fast);
        assert!(query.session_id.is_none());
        assert!(!query.constraints.fast_mode);
        assert!(query.constraints.top_k.is_none());
    }
}
