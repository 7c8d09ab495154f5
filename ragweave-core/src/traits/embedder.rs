//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Text-to-vector embedding capability
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Provider name (e.g. "mock", "openai")
    fn name(&self) -> &str;

    /// Embed a batch of texts
    ///
    /// # Errors
    ///
    /// Returns `Embedding` when the provider is unavailable or rejects the
    /// input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed output dimensionality
    fn dimensions(&self) -> usize;

    /// Model identifier, when applicable
    fn model(&self) -> Option<&str> {
        None
    }
}
