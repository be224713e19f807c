//! rag-lab: RAG experimentation pipeline
//!
//! Chunks documents, embeds the chunks, stores them in one of several
//! interchangeable vector stores, retrieves the most relevant chunks for a
//! question and hands them to a language model. The experiment harness sweeps
//! a configuration grid and records timing and resource metrics per run.

pub mod config;
pub mod error;
pub mod experiment;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod types;

pub use config::LabConfig;
pub use error::{Error, Result};
pub use experiment::{ExperimentHarness, SweepOutcome};
pub use providers::{EmbeddingProvider, LlmProvider, VectorStoreProvider};
pub use types::{
    document::{Chunk, Document},
    record::{IndexHandle, SearchHit, SimilarityMetric, VectorRecord},
    run::{PipelineRun, RunConfig},
};
