//! Ollama-based providers for embeddings and LLM
//!
//! Wraps the shared OllamaClient to implement the provider traits.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::OllamaClient;

use super::embedding::{EmbeddingModel, EmbeddingProvider};
use super::llm::LlmProvider;

/// Text sent once at construction to learn the model's dimension
const WARM_UP_TEXT: &str = "dimension probe";

/// Ollama embedding provider, batch-capable through `/api/embed`
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: EmbeddingModel,
    dimensions: usize,
    batch_size: usize,
}

impl OllamaEmbedder {
    /// Connect to a served model, fixing the dimension with one warm-up call
    pub async fn connect(client: Arc<OllamaClient>, model: EmbeddingModel, batch_size: usize) -> Result<Self> {
        if !model.is_remote() {
            return Err(Error::invalid_config(format!("{} is not served by Ollama", model)));
        }

        let probe = client.embed(model.as_str(), &[WARM_UP_TEXT.to_string()]).await?;
        let dimensions = probe.first().map(Vec::len).unwrap_or(0);
        if dimensions == 0 {
            return Err(Error::embedding(format!("{} returned an empty warm-up embedding", model)));
        }

        tracing::info!("Embedding model {} ready ({} dims)", model, dimensions);

        Ok(Self {
            client,
            model,
            dimensions,
            batch_size: batch_size.max(1),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client
            .embed(self.model.as_str(), &[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding(format!("{} returned no embedding", self.model)))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self.client.embed(self.model.as_str(), batch).await?;
            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} embeddings for batch {} of {} texts",
                    self.model,
                    vectors.len(),
                    i,
                    batch.len()
                )));
            }
            tracing::debug!("Embedded batch {} ({} texts)", i, batch.len());
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        self.model.as_str()
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaLlm {
    /// Create from an existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(&self.model, prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
