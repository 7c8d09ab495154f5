//! Generation service trait
//!
//! The core never hosts a model; answers, refinements, and evaluator
//! judgments all go through this seam to an external generation service.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// One generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Full prompt text
    pub prompt: String,
    /// Output token cap
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
    /// Cancellation scope propagated from the request boundary
    pub cancel: CancellationToken,
}

impl GenerationRequest {
    /// Create a request with typical answer-generation settings
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 500,
            temperature: 0.7,
            cancel: CancellationToken::new(),
        }
    }

    /// Low-temperature settings used by evaluators
    #[must_use]
    pub fn for_assessment(mut self) -> Self {
        self.max_tokens = 250;
        self.temperature = 0.1;
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// External text generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for the prompt
    ///
    /// # Errors
    ///
    /// Returns `Generation` on provider failure, `Cancelled` when the
    /// request token fires.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
