//! Error types for the RAG pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed chunking parameters, unknown backend or model names
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A vector-store batch write did not fully land
    #[error("Upload to {backend} failed for {failed} of {total} records: {message}")]
    UploadFailure {
        backend: String,
        failed: usize,
        total: usize,
        message: String,
    },

    /// Query or clear against an index that was never initialized
    #[error("Index '{index}' not found in {backend}")]
    IndexNotFound { backend: String, index: String },

    /// Embedding model or service failure
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// Language-model call failure
    #[error("Generation error: {0}")]
    Generation(String),

    /// Vector dimensionality differs from the index or provider dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Backend-native vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Transient service condition (throttling, server error, timeout)
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    /// Ingestion produced nothing to index
    #[error("No data to index: {0}")]
    NoData(String),

    /// Document could not be read or parsed
    #[error("Failed to load document '{path}': {message}")]
    DocumentLoad { path: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Redis protocol or connection error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Report writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create an embedding service error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingService(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an index-not-found error
    pub fn index_not_found(backend: impl Into<String>, index: impl Into<String>) -> Self {
        Self::IndexNotFound {
            backend: backend.into(),
            index: index.into(),
        }
    }

    /// Create an unavailable-service error
    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an upload failure for a whole batch
    pub fn upload(backend: impl Into<String>, failed: usize, total: usize, message: impl Into<String>) -> Self {
        Self::UploadFailure {
            backend: backend.into(),
            failed,
            total,
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Unavailable { .. } => true,
            Error::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Error::Redis(err) => err.is_io_error() || err.is_timeout() || err.is_connection_dropped(),
            _ => false,
        }
    }
}
