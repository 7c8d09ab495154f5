//! Result reranking

use ragweave_core::types::SearchResult;

/// Rescores a ranked result list against the query
pub trait Reranker: Send + Sync {
    /// Reranker name for logs
    fn name(&self) -> &str;

    /// Rerank results; returns the list sorted best-first
    fn rerank(&self, query: &str, results: Vec<SearchResult>) -> Vec<SearchResult>;
}

/// Lexical-overlap reranker
///
/// Blends the vector score with Jaccard word overlap between query and
/// chunk text. A cross-encoder provider can replace this behind the same
/// trait; the blend keeps ordering stable when texts are short.
#[derive(Debug, Clone)]
pub struct LexicalReranker {
    /// Weight of the lexical component in `[0, 1]`
    weight: f32,
}

impl LexicalReranker {
    /// Create a reranker with the given lexical weight
    #[must_use]
    pub fn new(weight: f32) -> Self {
        Self {
            weight: weight.clamp(0.0, 1.0),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn jaccard(a: &str, b: &str) -> f32 {
        let words_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
        let words_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
        let intersection = words_a.intersection(&words_b).count() as f32;
        let union = words_a.union(&words_b).count() as f32;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl Reranker for LexicalReranker {
    fn name(&self) -> &str {
        "lexical"
    }

    fn rerank(&self, query: &str, mut results: Vec<SearchResult>) -> Vec<SearchResult> {
        let query_lower = query.to_lowercase();
        for result in &mut results {
            let overlap = Self::jaccard(&query_lower, &result.text.to_lowercase());
            result.score = (1.0 - self.weight).mul_add(result.score, self.weight * overlap);
        }
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, text: &str, score: f32) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            document_id: "d".to_string(),
            text: text.to_string(),
            score,
            document_name: "d.txt".to_string(),
            chunk_index: 0,
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_lexical_overlap_promotes_matching_text() {
        let reranker = LexicalReranker::new(0.5);
        let results = vec![
            result("a", "completely unrelated content", 0.8),
            result("b", "rust borrow checker rules", 0.75),
        ];
        let reranked = reranker.rerank("rust borrow checker", results);
        assert_eq!(reranked[0].id, "b");
    }

    #[test]
    fn test_zero_weight_preserves_order() {
        let reranker = LexicalReranker::new(0.0);
        let results = vec![result("a", "x", 0.9), result("b", "y", 0.1)];
        let reranked = reranker.rerank("anything", results);
        assert_eq!(reranked[0].id, "a");
        assert!((reranked[0].score - 0.9).abs() < 1e-6);
    }
}
