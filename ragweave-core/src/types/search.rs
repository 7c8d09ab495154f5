//! Search result and chunk record types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ranked hit from any retriever
///
/// `score` is normalized to `[0, 1]` within a request; higher is better
/// regardless of the underlying collection metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chunk id (or URL for web results)
    pub id: String,
    /// Owning document id (empty for web results)
    pub document_id: String,
    /// Text content
    pub text: String,
    /// Normalized relevance score in `[0, 1]`
    pub score: f32,
    /// Display name of the source document
    pub document_name: String,
    /// Position of the chunk within its document
    pub chunk_index: i64,
    /// Retriever-specific metadata (file type, url, search mode, ...)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl SearchResult {
    /// Attach a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A document chunk as written into a vector collection
///
/// Chunks are immutable: created on ingest, destroyed only by deleting
/// their owning document. `embedding.len()` must equal the collection
/// dimension; the store rejects mismatches before writing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique chunk id
    pub id: String,
    /// Owning document id
    pub document_id: String,
    /// Owning knowledgebase id
    #[serde(default)]
    pub knowledgebase_id: String,
    /// Text content
    pub text: String,
    /// Position within the document
    pub chunk_index: i64,
    /// Display name of the source document
    pub document_name: String,
    /// File type of the source document
    pub file_type: String,
    /// Upload timestamp (unix epoch seconds)
    pub upload_date: i64,
    /// Document author, when known
    #[serde(default)]
    pub author: Option<String>,
    /// Creation timestamp (unix epoch seconds), when known
    #[serde(default)]
    pub creation_date: Option<i64>,
    /// Language code (e.g. "ko"), when known
    #[serde(default)]
    pub language: Option<String>,
    /// Comma-separated keywords, when known
    #[serde(default)]
    pub keywords: Option<String>,
    /// Embedding vector; dimension fixed per collection
    pub embedding: Vec<f32>,
}

impl ChunkRecord {
    /// Create a chunk with the required fields; optional metadata defaults
    /// to absent.
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        text: impl Into<String>,
        chunk_index: i64,
        document_name: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            knowledgebase_id: String::new(),
            text: text.into(),
            chunk_index,
            document_name: document_name.into(),
            file_type: "txt".to_string(),
            upload_date: 0,
            author: None,
            creation_date: None,
            language: None,
            keywords: None,
            embedding,
        }
    }
}
