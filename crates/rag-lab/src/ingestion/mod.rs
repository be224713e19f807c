//! Document ingestion: loading, chunking and indexing

mod chunker;
mod loader;
mod pipeline;

pub use chunker::{chunk, TextChunker};
pub use loader::DocumentLoader;
pub use pipeline::{EmbeddedChunks, IngestOutcome, IngestPipeline, IngestStats};
