//! Experiment run configuration and result records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::providers::vector_store::VectorBackend;

/// One point of the configuration grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Embedding model name
    pub embedding_model: String,
    /// Vector store backend
    pub database: VectorBackend,
    /// Language model name
    pub llm_model: String,
    /// Chunk size in tokens
    pub chunk_size: usize,
    /// Overlap in tokens
    pub overlap: usize,
    /// Prompt template
    pub prompt: String,
    /// Question text
    pub question: String,
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} | {} | {} | chunk={} overlap={} | q=\"{}\"]",
            self.database,
            self.embedding_model,
            self.llm_model,
            self.chunk_size,
            self.overlap,
            self.question
        )
    }
}

/// Result record of one experiment run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    /// Configuration that produced this run
    pub config: RunConfig,
    /// Wall-clock time of the embed call
    pub embedding_time: Duration,
    /// Wall-clock time of index initialization and upsert
    pub upload_time: Duration,
    /// Wall-clock time of embedding the question, retrieval and generation
    pub query_time: Duration,
    /// Peak resident memory growth during the run (MiB)
    pub memory_usage_mb: Option<f64>,
    /// Number of chunks produced
    pub num_chunks: usize,
    /// Generated answer
    pub answer: String,
    /// Manual quality score, filled in after the sweep
    pub score: Option<f64>,
}

impl PipelineRun {
    /// Flatten into a report row
    pub fn to_row(&self) -> ReportRow {
        ReportRow {
            embedding_model: self.config.embedding_model.clone(),
            database: self.config.database.to_string(),
            llm_model: self.config.llm_model.clone(),
            chunk_size: self.config.chunk_size,
            overlap: self.config.overlap,
            question: self.config.question.clone(),
            embedding_time: self.embedding_time.as_secs_f64(),
            upload_time: self.upload_time.as_secs_f64(),
            query_time: self.query_time.as_secs_f64(),
            num_chunks: self.num_chunks,
            answer: self.answer.clone(),
            memory_usage: self.memory_usage_mb,
            score: self.score,
        }
    }
}

/// One row of the tabular report; field order is the column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub embedding_model: String,
    pub database: String,
    pub llm_model: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub question: String,
    pub embedding_time: f64,
    pub upload_time: f64,
    pub query_time: f64,
    pub num_chunks: usize,
    pub answer: String,
    pub memory_usage: Option<f64>,
    pub score: Option<f64>,
}

impl ReportRow {
    /// Header row, matching the serialized field order
    pub const COLUMNS: [&'static str; 13] = [
        "embedding_model",
        "database",
        "llm_model",
        "chunk_size",
        "overlap",
        "question",
        "embedding_time",
        "upload_time",
        "query_time",
        "num_chunks",
        "answer",
        "memory_usage",
        "score",
    ];
}

/// Stage of a run at which a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    /// Clearing or initializing the backend index
    Reset,
    /// Chunking, embedding or uploading
    Ingest,
    /// Embedding the question and retrieving context
    Retrieve,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Reset => "reset",
            RunStage::Ingest => "ingest",
            RunStage::Retrieve => "retrieve",
        };
        f.write_str(s)
    }
}

/// A run that was skipped because one of its stages failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    /// Configuration that failed
    pub config: RunConfig,
    /// Failing stage
    pub stage: RunStage,
    /// Error description
    pub message: String,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed during {}: {}", self.config, self.stage, self.message)
    }
}
