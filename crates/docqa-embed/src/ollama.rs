//! Ollama HTTP clients for embeddings (`/api/embeddings`) and completions (`/api/generate`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docqa_core::{Embedder, Error, Generator, Result};

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dim: usize,
    id: String,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, dim: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dim,
            id: format!("ollama:{model}:d{dim}"),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&EmbeddingsRequest { model: &self.model, prompt: text })
            .send()
            .await
            .map_err(|e| Error::EmbeddingFailure(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(Error::EmbeddingFailure(format!("ollama returned {status}: {body}")));
        }

        let payload: EmbeddingsResponse = res.json().await.map_err(|e| Error::EmbeddingFailure(e.to_string()))?;
        if payload.embedding.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: payload.embedding.len() });
        }
        Ok(payload.embedding)
    }
}

#[derive(Clone)]
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str { &self.model }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&GenerateRequest { model: &self.model, prompt, stream: false })
            .send()
            .await
            .map_err(|e| Error::GenerationFailure(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(Error::GenerationFailure(format!("ollama returned {status}: {body}")));
        }

        let payload: GenerateResponse = res.json().await.map_err(|e| Error::GenerationFailure(e.to_string()))?;
        Ok(payload.response.trim().to_string())
    }
}
