//! Provider abstractions for embeddings, LLM and vector storage
//!
//! Trait-based seams that let the pipeline switch between embedding models
//! and between the local, Redis and Pinecone vector stores.

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod pinecone;
pub mod redis;
pub mod retry;
pub mod vector_store;

pub use embedding::{embed_all, EmbeddingModel, EmbeddingProvider};
pub use hashing::HashingEmbedder;
pub use llm::LlmProvider;
pub use local::LocalVectorStore;
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use pinecone::PineconeVectorStore;
pub use self::redis::RedisVectorStore;
pub use retry::RetryPolicy;
pub use vector_store::{VectorBackend, VectorStoreProvider};
