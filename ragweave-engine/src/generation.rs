//! Generation wrappers and prompt helpers

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use ragweave_core::error::Result;
use ragweave_core::traits::{GenerationRequest, Generator};
use ragweave_core::types::SearchResult;

/// Generator wrapper retrying transient failures exactly once
///
/// A second failure is fatal to the calling path. `InvalidArgument` and
/// cancellation are never retried.
pub struct RetryingGenerator {
    inner: Arc<dyn Generator>,
}

impl std::fmt::Debug for RetryingGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingGenerator").finish_non_exhaustive()
    }
}

impl RetryingGenerator {
    /// Wrap a generator
    pub fn new(inner: Arc<dyn Generator>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Generator for RetryingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        match self.inner.generate(request).await {
            Ok(text) => Ok(text),
            Err(e) if e.is_retryable() || matches!(e, ragweave_core::error::RagError::Generation { .. }) => {
                if request.cancel.is_cancelled() {
                    return Err(e);
                }
                warn!(error = %e, "generation failed, retrying once");
                self.inner.generate(request).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Build the answer-generation prompt from retrieved context
#[must_use]
pub fn answer_prompt(query: &str, context: &[SearchResult]) -> String {
    if context.is_empty() {
        return format!(
            "Answer the question from general knowledge. If unsure, say so.\n\nQuestion: {query}\n\nAnswer:"
        );
    }
    let mut prompt = String::from(
        "Answer the question using only the context below. Cite nothing outside it.\n\nContext:\n",
    );
    for (i, result) in context.iter().take(10).enumerate() {
        let snippet: String = result.text.chars().take(800).collect();
        prompt.push_str(&format!("[{}] {}: {}\n", i + 1, result.document_name, snippet));
    }
    prompt.push_str(&format!("\nQuestion: {query}\n\nAnswer:"));
    prompt
}

/// Build the query-refinement prompt
#[must_use]
pub fn refine_prompt(query: &str) -> String {
    format!(
        "Reformulate this query to improve retrieval results.\n\n\
         Original Query: {query}\n\n\
         Create a refined query that expands key concepts, adds relevant \
         synonyms, makes intent explicit, and stays concise.\n\nRefined Query:"
    )
}

/// Build the decomposition prompt
#[must_use]
pub fn decompose_prompt(query: &str) -> String {
    format!(
        "Break the question below into at most 3 self-contained sub-questions \
         that together answer it. One per line, no numbering.\n\nQuestion: {query}"
    )
}
