//! Episodic records of completed agentic runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted record of one completed agentic run
///
/// Looked up by embedding similarity before decomposition so that a
/// sufficiently similar past query can donate its plan as a warm start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Unique identifier
    #[serde(default = "generate_id")]
    pub id: String,
    /// Original query text
    pub query: String,
    /// Embedding of the query text
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub query_embedding: Vec<f32>,
    /// Decomposition plan produced for the query
    #[serde(default)]
    pub plan: Vec<String>,
    /// Final answer
    pub response: String,
    /// Final confidence of the run
    pub confidence: f32,
    /// Iterations consumed
    pub iterations: usize,
    /// Language of the query, when known
    #[serde(default)]
    pub language: Option<String>,
    /// Completion time
    pub timestamp: DateTime<Utc>,
}

impl Episode {
    /// Create an episode stamped with the current time
    pub fn new(
        query: impl Into<String>,
        query_embedding: Vec<f32>,
        plan: Vec<String>,
        response: impl Into<String>,
        confidence: f32,
        iterations: usize,
    ) -> Self {
        Self {
            id: generate_id(),
            query: query.into(),
            query_embedding,
            plan,
            response: response.into(),
            confidence,
            iterations,
            language: None,
            timestamp: Utc::now(),
        }
    }
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
