use async_trait::async_trait;

use crate::error::Result;

/// Maps text to a fixed-length vector.
///
/// Implementations return vectors of exactly `dim()` components and fail with
/// `Error::EmbeddingFailure` on malformed input or upstream unavailability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `ollama:nomic-embed-text`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Produces a natural-language answer from a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}
