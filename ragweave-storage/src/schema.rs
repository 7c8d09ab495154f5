//! Collection schemas
//!
//! Field layouts for the document-chunk and episode collections. Dynamic
//! field extension is permitted on both, so retrievers may attach extra
//! metadata without schema migrations.

use serde::{Deserialize, Serialize};

/// Field data types understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Variable-length string
    VarChar {
        /// Maximum length in characters
        max_length: usize,
    },
    /// 64-bit integer
    Int64,
    /// 32-bit float
    Float,
    /// Fixed-dimension float vector
    FloatVector {
        /// Vector dimension
        dim: usize,
    },
}

/// One field of a collection schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name
    pub name: String,
    /// Data type
    pub kind: FieldKind,
    /// Whether this field is the primary key
    pub primary: bool,
    /// Human-readable description
    pub description: String,
}

impl FieldSchema {
    fn new(name: &str, kind: FieldKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            primary: false,
            description: description.to_string(),
        }
    }

    fn primary_key(name: &str, kind: FieldKind, description: &str) -> Self {
        Self {
            primary: true,
            ..Self::new(name, kind, description)
        }
    }
}

/// Schema of one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Ordered fields
    pub fields: Vec<FieldSchema>,
    /// Whether fields outside the schema are accepted
    pub enable_dynamic_fields: bool,
}

impl CollectionSchema {
    /// Embedding dimension declared by the vector field
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.fields.iter().find_map(|f| match f.kind {
            FieldKind::FloatVector { dim } => Some(dim),
            _ => None,
        })
    }

    /// Name of the primary-key field
    #[must_use]
    pub fn primary_field(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.primary)
            .map(|f| f.name.as_str())
    }
}

/// Schema for the document-chunk collection
#[must_use]
pub fn chunk_collection_schema(name: &str, embedding_dim: usize) -> CollectionSchema {
    CollectionSchema {
        name: name.to_string(),
        description: "Document chunks with embeddings".to_string(),
        fields: vec![
            FieldSchema::primary_key(
                "id",
                FieldKind::VarChar { max_length: 100 },
                "Unique chunk identifier",
            ),
            FieldSchema::new(
                "document_id",
                FieldKind::VarChar { max_length: 100 },
                "Parent document identifier",
            ),
            FieldSchema::new(
                "knowledgebase_id",
                FieldKind::VarChar { max_length: 100 },
                "Owning knowledgebase",
            ),
            FieldSchema::new(
                "text",
                FieldKind::VarChar { max_length: 65_535 },
                "Text content of the chunk",
            ),
            FieldSchema::new(
                "embedding",
                FieldKind::FloatVector { dim: embedding_dim },
                "Chunk embedding",
            ),
            FieldSchema::new(
                "chunk_index",
                FieldKind::Int64,
                "Position of chunk in document",
            ),
            FieldSchema::new(
                "document_name",
                FieldKind::VarChar { max_length: 500 },
                "Original document filename",
            ),
            FieldSchema::new(
                "file_type",
                FieldKind::VarChar { max_length: 50 },
                "Document file type",
            ),
            FieldSchema::new(
                "upload_date",
                FieldKind::Int64,
                "Upload timestamp (unix epoch)",
            ),
            FieldSchema::new(
                "author",
                FieldKind::VarChar { max_length: 200 },
                "Document author",
            ),
            FieldSchema::new(
                "creation_date",
                FieldKind::Int64,
                "Creation timestamp (unix epoch)",
            ),
            FieldSchema::new(
                "language",
                FieldKind::VarChar { max_length: 10 },
                "Language code",
            ),
            FieldSchema::new(
                "keywords",
                FieldKind::VarChar { max_length: 1_000 },
                "Comma-separated keywords",
            ),
        ],
        enable_dynamic_fields: true,
    }
}

/// Schema for the episode collection used by agentic warm starts
#[must_use]
pub fn episode_collection_schema(name: &str, embedding_dim: usize) -> CollectionSchema {
    CollectionSchema {
        name: name.to_string(),
        description: "Completed agentic runs for warm-starting similar queries".to_string(),
        fields: vec![
            FieldSchema::primary_key(
                "id",
                FieldKind::VarChar { max_length: 100 },
                "Unique episode identifier",
            ),
            FieldSchema::new(
                "query",
                FieldKind::VarChar { max_length: 4_000 },
                "Original query text",
            ),
            FieldSchema::new(
                "embedding",
                FieldKind::FloatVector { dim: embedding_dim },
                "Query embedding",
            ),
            FieldSchema::new(
                "plan",
                FieldKind::VarChar { max_length: 8_000 },
                "Decomposition plan (JSON array)",
            ),
            FieldSchema::new(
                "response",
                FieldKind::VarChar { max_length: 65_535 },
                "Final answer",
            ),
            FieldSchema::new("confidence", FieldKind::Float, "Final run confidence"),
            FieldSchema::new("iterations", FieldKind::Int64, "Iterations consumed"),
            FieldSchema::new(
                "language",
                FieldKind::VarChar { max_length: 10 },
                "Query language code",
            ),
            FieldSchema::new(
                "timestamp",
                FieldKind::Int64,
                "Completion timestamp (unix epoch)",
            ),
        ],
        enable_dynamic_fields: true,
    }
}
