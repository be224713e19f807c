//! Vector store provider trait for index lifecycle, upsert and similarity search

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{IndexHandle, SearchHit, SimilarityMetric, VectorRecord};

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `LocalVectorStore`: persistent embedded store (redb)
/// - `RedisVectorStore`: Redis Stack with RediSearch vector fields
/// - `PineconeVectorStore`: Pinecone serverless index
///
/// Every implementation validates vector dimensionality against the handle
/// before talking to the backend.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Create the index if missing, otherwise reuse it
    ///
    /// Never destroys existing data. Reusing an index with a different
    /// dimension is a `DimensionMismatch`.
    async fn initialize_index(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> Result<IndexHandle>;

    /// Write all records; an existing id is overwritten
    ///
    /// Returns the number of records written. Either every record lands or
    /// the call fails with `UploadFailure`.
    async fn upsert(&self, index: &IndexHandle, records: &[VectorRecord]) -> Result<usize>;

    /// Most-similar records first, at most `top_k`; empty for an empty index
    async fn query(&self, index: &IndexHandle, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;

    /// Remove all records, keeping the index definition
    async fn clear(&self, index: &IndexHandle) -> Result<()>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Which backend this is
    fn backend(&self) -> VectorBackend;

    /// Get provider name for logging
    fn name(&self) -> &str {
        self.backend().as_str()
    }
}

/// Vector store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Persistent local store
    #[serde(alias = "chroma")]
    Local,
    /// Redis Stack (network key-value store with vector search)
    Redis,
    /// Pinecone managed cloud index
    Pinecone,
}

impl VectorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorBackend::Local => "local",
            VectorBackend::Redis => "redis",
            VectorBackend::Pinecone => "pinecone",
        }
    }
}

impl fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "chroma" => Ok(VectorBackend::Local),
            "redis" => Ok(VectorBackend::Redis),
            "pinecone" => Ok(VectorBackend::Pinecone),
            other => Err(Error::invalid_config(format!("unknown vector store backend '{}'", other))),
        }
    }
}
