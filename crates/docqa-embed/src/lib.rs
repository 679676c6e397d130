//! Embedding and generation capabilities for the retrieval pipeline.
//!
//! Respects `APP_USE_FAKE_EMBEDDINGS=1` to switch to the [`HashEmbedder`] for
//! fast and deterministic outputs in tests and development.

use std::sync::Arc;

use docqa_core::config::{EmbeddingProvider, EmbeddingSettings, GenerationSettings};
use docqa_core::{Embedder, Generator};

pub mod hash;
pub mod ollama;

pub use hash::HashEmbedder;
pub use ollama::{OllamaEmbedder, OllamaGenerator};

fn fake_embeddings_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Arc<dyn Embedder> {
    if fake_embeddings_forced() || settings.provider == EmbeddingProvider::Fake {
        tracing::info!(dim = settings.dim, "using hash embedder");
        return Arc::new(HashEmbedder::new(settings.dim));
    }
    tracing::info!(model = %settings.model, base_url = %settings.base_url, "using ollama embedder");
    Arc::new(OllamaEmbedder::new(&settings.base_url, &settings.model, settings.dim))
}

pub fn generator_from_settings(settings: &GenerationSettings) -> Arc<dyn Generator> {
    tracing::info!(model = %settings.model, base_url = %settings.base_url, "using ollama generator");
    Arc::new(OllamaGenerator::new(&settings.base_url, &settings.model))
}
