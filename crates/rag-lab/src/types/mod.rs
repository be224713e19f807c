//! Core types for the RAG pipeline

pub mod document;
pub mod record;
pub mod run;

pub use document::{Chunk, Document};
pub use record::{IndexHandle, RecordMetadata, SearchHit, SimilarityMetric, VectorRecord};
pub use run::{PipelineRun, ReportRow, RunConfig, RunFailure, RunStage};
