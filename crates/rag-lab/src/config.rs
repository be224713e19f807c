//! Configuration for the RAG lab

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingModel;
use crate::providers::retry::RetryPolicy;
use crate::providers::vector_store::VectorBackend;
use crate::retrieval::DEFAULT_TOP_K;

/// Environment variable consulted when no Pinecone API key is configured
pub const PINECONE_API_KEY_ENV: &str = "PINECONE_API_KEY";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Sweep configuration
    pub experiment: ExperimentConfig,
}

impl LabConfig {
    /// Load from a TOML file; missing sections take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: LabConfig = toml::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject sweeps that cannot produce a single run
    pub fn validate(&self) -> Result<()> {
        let exp = &self.experiment;
        let axes = [
            ("backends", exp.backends.len()),
            ("llm_models", exp.llm_models.len()),
            ("chunk_sizes", exp.chunk_sizes.len()),
            ("overlaps", exp.overlaps.len()),
            ("prompts", exp.prompts.len()),
            ("questions", exp.questions.len()),
        ];
        if let Some((axis, _)) = axes.iter().find(|(_, len)| *len == 0) {
            return Err(Error::invalid_config(format!("experiment.{} must not be empty", axis)));
        }
        if exp.top_k == 0 {
            return Err(Error::invalid_config("experiment.top_k must be at least 1"));
        }
        if exp.index_name.trim().is_empty() {
            return Err(Error::invalid_config("experiment.index_name must not be empty"));
        }
        if self.embeddings.batch_size == 0 || self.vector_db.redis.batch_size == 0 {
            return Err(Error::invalid_config("batch sizes must be at least 1"));
        }
        if !(1..=100).contains(&self.vector_db.pinecone.batch_size) {
            return Err(Error::invalid_config("vector_db.pinecone.batch_size must be within 1..=100"));
        }
        Ok(())
    }

    /// Retry policy for LLM and embedding calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.llm.max_retries, Duration::from_millis(self.llm.retry_base_delay_ms))
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Backoff before the first retry
    pub retry_base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
            retry_base_delay_ms: 1000,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama URL for embeddings (defaults to `llm.base_url`)
    pub base_url: Option<String>,
    /// Texts per `/api/embed` request
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Dimensions of the offline hashing embedder
    pub hashing_dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            batch_size: 64,
            timeout_secs: 120,
            hashing_dimensions: 384,
        }
    }
}

/// Vector database configuration, one section per backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    pub local: LocalStoreConfig,
    pub redis: RedisConfig,
    pub pinecone: PineconeConfig,
}

/// Persistent local store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStoreConfig {
    /// Database file
    pub path: PathBuf,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("rag-lab-data").join("vectors.redb"),
        }
    }
}

/// Redis Stack connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL
    pub url: String,
    /// Commands per pipeline
    pub batch_size: usize,
    /// Per-operation timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            batch_size: 256,
            timeout_secs: 30,
        }
    }
}

/// Pinecone serverless index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    /// API key; falls back to `PINECONE_API_KEY`
    pub api_key: Option<String>,
    /// Control-plane base URL
    pub control_plane_url: String,
    /// `X-Pinecone-API-Version` header
    pub api_version: String,
    /// Serverless cloud
    pub cloud: String,
    /// Serverless region
    pub region: String,
    /// Namespace records are written to
    pub namespace: String,
    /// Vectors per upsert request (Pinecone caps this at 100)
    pub batch_size: usize,
    /// How long to wait for a new index to become ready
    pub ready_timeout_secs: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            control_plane_url: "https://api.pinecone.io".to_string(),
            api_version: "2024-07".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            namespace: String::new(),
            batch_size: 100,
            ready_timeout_secs: 120,
            timeout_secs: 60,
        }
    }
}

impl PineconeConfig {
    /// Configured key, or the environment fallback
    pub fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(PINECONE_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "no Pinecone API key: set vector_db.pinecone.api_key or {}",
                    PINECONE_API_KEY_ENV
                ))
            })
    }
}

/// A backend and the embedding model its index is populated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPlan {
    pub backend: VectorBackend,
    pub embedding_model: EmbeddingModel,
}

impl BackendPlan {
    pub fn new(backend: VectorBackend, embedding_model: EmbeddingModel) -> Self {
        Self {
            backend,
            embedding_model,
        }
    }
}

/// Sweep axes and report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Logical index name shared by every backend
    pub index_name: String,
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Backends to sweep, in phase order
    pub backends: Vec<BackendPlan>,
    /// Ollama generation models
    pub llm_models: Vec<String>,
    /// Chunk sizes in tokens
    pub chunk_sizes: Vec<usize>,
    /// Overlaps in tokens
    pub overlaps: Vec<usize>,
    /// Prompt templates
    pub prompts: Vec<String>,
    /// Questions asked for every configuration
    pub questions: Vec<String>,
    /// CSV report path
    pub report_path: PathBuf,
    /// Sample resident memory around each run
    pub track_memory: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            index_name: "ds4300".to_string(),
            top_k: DEFAULT_TOP_K,
            backends: vec![
                BackendPlan::new(VectorBackend::Local, EmbeddingModel::MxbaiEmbedLarge),
                BackendPlan::new(VectorBackend::Redis, EmbeddingModel::NomicEmbedText),
                BackendPlan::new(VectorBackend::Pinecone, EmbeddingModel::AllMiniLm),
            ],
            llm_models: vec!["llama3.2".to_string(), "mistral".to_string()],
            chunk_sizes: vec![100, 500],
            overlaps: vec![0, 100],
            prompts: vec![
                "Answer the question based on the context provided below:".to_string(),
                "Please provide a detailed answer to the question below based on the context provided:"
                    .to_string(),
            ],
            questions: vec![
                "How many databases can Redis have?".to_string(),
                "What is the purpose of logical replication (row based) in databases, and how is it different from statement-based replication?".to_string(),
                "Describe the CAP Theorem and how many can it simultaneously provide?".to_string(),
                "Compare the use cases for Redis lists vs. Redis sets.".to_string(),
            ],
            report_path: PathBuf::from("experiment_results.csv"),
            track_memory: true,
        }
    }
}
