//! Episode store for agentic warm starts
//!
//! Completed runs are persisted with their query embedding; before
//! decomposing, the engine looks for a sufficiently similar past query and
//! reuses its plan. Read-mostly: lookups on every agentic run, one write
//! per completion.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ragweave_core::error::Result;
use ragweave_core::math::cosine_similarity;
use ragweave_core::types::Episode;
use ragweave_storage::{FilterExpr, VectorRow, VectorStore};

/// Persistence contract for episodes
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Persist a completed run
    async fn record(&self, episode: Episode) -> Result<()>;

    /// Most similar past episode at or above `min_similarity`, optionally
    /// restricted to one language
    async fn find_similar(
        &self,
        embedding: &[f32],
        min_similarity: f32,
        language: Option<&str>,
    ) -> Result<Option<Episode>>;
}

/// In-process episode store behind a reader-writer lock
#[derive(Debug, Default)]
pub struct InMemoryEpisodeStore {
    entries: RwLock<Vec<Episode>>,
}

impl InMemoryEpisodeStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored episodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl EpisodeStore for InMemoryEpisodeStore {
    async fn record(&self, episode: Episode) -> Result<()> {
        self.entries.write().push(episode);
        Ok(())
    }

    async fn find_similar(
        &self,
        embedding: &[f32],
        min_similarity: f32,
        language: Option<&str>,
    ) -> Result<Option<Episode>> {
        let entries = self.entries.read();
        let best = entries
            .iter()
            .filter(|e| language.is_none() || e.language.as_deref() == language)
            .map(|e| (cosine_similarity(embedding, &e.query_embedding), e))
            .filter(|(similarity, _)| *similarity >= min_similarity)
            .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, e)| e.clone());
        Ok(best)
    }
}

/// Episode store persisted in the vector database
///
/// Uses the episode collection (same technology as document chunks), so
/// warm starts survive restarts. Assumes a cosine-metric collection so
/// search scores are directly comparable to the similarity threshold.
pub struct VectorEpisodeStore {
    store: Arc<VectorStore>,
}

impl std::fmt::Debug for VectorEpisodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorEpisodeStore")
            .field("collection", &self.store.collection())
            .finish()
    }
}

impl VectorEpisodeStore {
    /// Wrap the episode collection's store
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    fn to_row(episode: &Episode) -> VectorRow {
        VectorRow::new(episode.id.clone(), episode.query_embedding.clone())
            .with_field("query", json!(episode.query))
            .with_field(
                "plan",
                json!(serde_json::to_string(&episode.plan).unwrap_or_default()),
            )
            .with_field("response", json!(episode.response))
            .with_field("confidence", json!(episode.confidence))
            .with_field("iterations", json!(episode.iterations as i64))
            .with_field(
                "language",
                episode.language.as_ref().map_or(Value::Null, |l| json!(l)),
            )
            .with_field("timestamp", json!(episode.timestamp.timestamp()))
    }

    fn from_row(row: &VectorRow) -> Episode {
        let get_str = |name: &str| -> String {
            row.fields
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let plan: Vec<String> = row
            .fields
            .get("plan")
            .and_then(Value::as_str)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Episode {
            id: row.id.clone(),
            query: get_str("query"),
            query_embedding: row.embedding.clone(),
            plan,
            response: get_str("response"),
            confidence: row
                .fields
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0) as f32,
            iterations: row
                .fields
                .get("iterations")
                .and_then(Value::as_i64)
                .unwrap_or(0) as usize,
            language: row.fields.get("language").and_then(Value::as_str).map(String::from),
            timestamp: row
                .fields
                .get("timestamp")
                .and_then(Value::as_i64)
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                .unwrap_or_else(chrono::Utc::now),
        }
    }
}

#[async_trait]
impl EpisodeStore for VectorEpisodeStore {
    async fn record(&self, episode: Episode) -> Result<()> {
        let row = Self::to_row(&episode);
        self.store
            .insert_rows(vec![row], &CancellationToken::new())
            .await?;
        debug!(episode = %episode.id, "episode recorded");
        Ok(())
    }

    async fn find_similar(
        &self,
        embedding: &[f32],
        min_similarity: f32,
        language: Option<&str>,
    ) -> Result<Option<Episode>> {
        let filter = language.map(|lang| FilterExpr::eq("language", lang));
        let hits = self
            .store
            .search(
                embedding,
                1,
                0.5,
                filter.as_ref(),
                &[],
                &CancellationToken::new(),
            )
            .await?;
        Ok(hits
            .into_iter()
            .next()
            .filter(|hit| hit.score >= min_similarity)
            .map(|hit| Self::from_row(&hit.row)))
    }
}
