//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: Ollama server, batch-capable (`/api/embed`)
/// - `HashingEmbedder`: offline feature hashing, one text at a time
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    ///
    /// Default implementation calls `embed` sequentially.
    /// Batch-capable implementations override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensions, fixed at construction
    fn dimensions(&self) -> usize;

    /// Model identifier (recorded on index handles and in reports)
    fn model(&self) -> &str;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Embed `texts` and enforce the alignment contract
///
/// The result has one vector per input, in input order, each of the
/// provider's declared dimension. A vector of any other length is an
/// integrity violation and fails the whole call.
pub async fn embed_all(provider: &dyn EmbeddingProvider, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = provider.embed_batch(texts).await?;

    if embeddings.len() != texts.len() {
        return Err(Error::embedding(format!(
            "{} returned {} embeddings for {} inputs",
            provider.name(),
            embeddings.len(),
            texts.len()
        )));
    }

    let expected = provider.dimensions();
    if let Some(bad) = embeddings.iter().find(|v| v.len() != expected) {
        tracing::error!(
            "{} ({}) produced a {}-dim vector, expected {}",
            provider.name(),
            provider.model(),
            bad.len(),
            expected
        );
        return Err(Error::DimensionMismatch {
            expected,
            actual: bad.len(),
        });
    }

    Ok(embeddings)
}

/// Embedding model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingModel {
    /// nomic-embed-text (768 dims)
    #[serde(rename = "nomic-embed-text")]
    NomicEmbedText,
    /// mxbai-embed-large (1024 dims)
    #[serde(rename = "mxbai-embed-large")]
    MxbaiEmbedLarge,
    /// all-minilm sentence transformer (384 dims)
    #[serde(rename = "all-minilm")]
    AllMiniLm,
    /// Offline feature hashing
    #[serde(rename = "hashing")]
    Hashing,
}

impl EmbeddingModel {
    pub const ALL: [EmbeddingModel; 4] = [
        EmbeddingModel::NomicEmbedText,
        EmbeddingModel::MxbaiEmbedLarge,
        EmbeddingModel::AllMiniLm,
        EmbeddingModel::Hashing,
    ];

    /// Model name as configured and as served by Ollama
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingModel::NomicEmbedText => "nomic-embed-text",
            EmbeddingModel::MxbaiEmbedLarge => "mxbai-embed-large",
            EmbeddingModel::AllMiniLm => "all-minilm",
            EmbeddingModel::Hashing => "hashing",
        }
    }

    /// Whether the model is served by Ollama
    pub fn is_remote(&self) -> bool {
        !matches!(self, EmbeddingModel::Hashing)
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| Error::invalid_config(format!("unknown embedding model '{}'", s)))
    }
}
