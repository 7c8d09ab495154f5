//! Observation filtering
//!
//! Each retrieval round produces raw documents; items whose content is
//! nearly identical to evidence already accepted add no marginal
//! information and are dropped. This bounds context growth across
//! iterations.

use std::sync::Arc;

use tracing::debug;

use ragweave_core::math::cosine_similarity;
use ragweave_core::traits::Embedder;
use ragweave_core::types::SearchResult;

/// Hard cap on accepted evidence per run
const MAX_CONTEXT_ITEMS: usize = 50;

/// Drops redundant observations by embedding similarity
pub struct ObservationFilter {
    embedder: Arc<dyn Embedder>,
    /// Similarity to accepted content at or above which an item is dropped
    novelty_threshold: f32,
}

impl std::fmt::Debug for ObservationFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationFilter")
            .field("novelty_threshold", &self.novelty_threshold)
            .finish_non_exhaustive()
    }
}

impl ObservationFilter {
    /// Create a filter
    pub fn new(embedder: Arc<dyn Embedder>, novelty_threshold: f32) -> Self {
        Self {
            embedder,
            novelty_threshold: novelty_threshold.clamp(0.0, 1.0),
        }
    }

    /// Filter a retrieval round against already-accepted context
    ///
    /// Duplicates by id are always dropped; near-duplicates by content are
    /// dropped when their embedding similarity to any accepted item
    /// reaches the novelty threshold. Embedding failures degrade to
    /// id-level deduplication only.
    pub async fn filter(
        &self,
        accepted: &[SearchResult],
        incoming: Vec<SearchResult>,
    ) -> Vec<SearchResult> {
        let budget = MAX_CONTEXT_ITEMS.saturating_sub(accepted.len());
        if budget == 0 || incoming.is_empty() {
            return Vec::new();
        }

        let mut fresh: Vec<SearchResult> = Vec::new();
        let mut candidates = Vec::new();
        for item in incoming {
            let duplicate = accepted.iter().chain(candidates.iter()).any(|a| a.id == item.id);
            if !duplicate {
                candidates.push(item);
            }
        }
        if candidates.is_empty() {
            return Vec::new();
        }
        if accepted.is_empty() {
            candidates.truncate(budget);
            return candidates;
        }

        let accepted_texts: Vec<String> = accepted.iter().map(|r| r.text.clone()).collect();
        let candidate_texts: Vec<String> = candidates.iter().map(|r| r.text.clone()).collect();

        let (accepted_vecs, candidate_vecs) = match (
            self.embedder.embed(&accepted_texts).await,
            self.embedder.embed(&candidate_texts).await,
        ) {
            (Ok(a), Ok(c)) => (a, c),
            _ => {
                debug!("observation embedding failed, keeping id-deduplicated round");
                candidates.truncate(budget);
                return candidates;
            }
        };

        let mut dropped = 0;
        for (candidate, embedding) in candidates.into_iter().zip(candidate_vecs) {
            if fresh.len() >= budget {
                break;
            }
            let redundant = accepted_vecs
                .iter()
                .any(|a| cosine_similarity(a, &embedding) >= self.novelty_threshold);
            if redundant {
                dropped += 1;
            } else {
                fresh.push(candidate);
            }
        }

        if dropped > 0 {
            debug!(dropped, kept = fresh.len(), "observation filter dropped redundant items");
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::search_result;
    use ragweave_rag::MockEmbedder;

    fn filter(threshold: f32) -> ObservationFilter {
        ObservationFilter::new(Arc::new(MockEmbedder::new(32)), threshold)
    }

    #[tokio::test]
    async fn test_exact_duplicate_content_is_dropped() {
        let filter = filter(0.85);
        let accepted = vec![search_result("c1", "d1", "identical content", 0.9)];
        let incoming = vec![search_result("c2", "d2", "identical content", 0.8)];

        let fresh = filter.filter(&accepted, incoming).await;
        assert!(fresh.is_empty());
    }

    #[tokio::test]
    async fn test_novel_content_is_kept() {
        let filter = filter(0.85);
        let accepted = vec![search_result("c1", "d1", "rust ownership semantics", 0.9)];
        let incoming = vec![search_result(
            "c2",
            "d2",
            "photosynthesis in deep sea algae",
            0.8,
        )];

        let fresh = filter.filter(&accepted, incoming).await;
        assert_eq!(fresh.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_dropped_without_embedding() {
        let filter = filter(0.85);
        let accepted = vec![search_result("c1", "d1", "text a", 0.9)];
        let incoming = vec![
            search_result("c1", "d1", "text a", 0.9),
            search_result("c2", "d2", "entirely different topic", 0.8),
        ];

        let fresh = filter.filter(&accepted, incoming).await;
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "c2");
    }

    #[tokio::test]
    async fn test_first_round_passes_through() {
        let filter = filter(0.85);
        let incoming = vec![
            search_result("c1", "d1", "a", 0.9),
            search_result("c2", "d2", "b", 0.8),
        ];
        let fresh = filter.filter(&[], incoming).await;
        assert_eq!(fresh.len(), 2);
    }
}
