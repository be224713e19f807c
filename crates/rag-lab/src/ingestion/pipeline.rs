//! Ingestion pipeline orchestration: chunk, embed, upsert

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::providers::embedding::{embed_all, EmbeddingProvider};
use crate::providers::vector_store::VectorStoreProvider;
use crate::types::{Chunk, Document, IndexHandle, SimilarityMetric, VectorRecord};

use super::chunker::TextChunker;

/// Timing and size statistics of one ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Wall-clock time of the embed call
    pub embed_time: Duration,
    /// Wall-clock time of index initialization and upsert
    pub upload_time: Duration,
    /// Chunks produced across all documents
    pub chunk_count: usize,
}

/// Embedded chunks waiting to be uploaded
#[derive(Debug, Clone)]
pub struct EmbeddedChunks {
    /// One record per chunk, ids `doc_<i>` in chunk order
    pub records: Vec<VectorRecord>,
    /// Wall-clock time of the embed call
    pub embed_time: Duration,
    dimension: usize,
    embedding_model: String,
}

/// Result of an ingestion
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Records were written; the handle is ready for queries
    Indexed { handle: IndexHandle, stats: IngestStats },
    /// Nothing to index: no documents, or no non-blank chunks
    NoData,
}

/// Main ingestion pipeline
#[derive(Debug, Clone, Copy)]
pub struct IngestPipeline {
    /// Text chunker
    chunker: TextChunker,
    /// Metric new indexes are created with
    metric: SimilarityMetric,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        Ok(Self::with_chunker(TextChunker::new(chunk_size, overlap)?))
    }

    pub fn with_chunker(chunker: TextChunker) -> Self {
        Self {
            chunker,
            metric: SimilarityMetric::Cosine,
        }
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    /// Chunk every document, in document order
    pub fn build_chunks(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                let chunks = self.chunker.chunk_document(doc);
                tracing::debug!("Created {} chunks from {}", chunks.len(), doc.id);
                chunks
            })
            .collect()
    }

    /// Chunk and embed `documents`; `None` when there is nothing to index
    pub async fn embed_documents(
        &self,
        documents: &[Document],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Option<EmbeddedChunks>> {
        if documents.is_empty() {
            tracing::warn!("No documents found.");
            return Ok(None);
        }

        let chunks = self.build_chunks(documents);
        if chunks.is_empty() {
            tracing::warn!("Documents produced no chunks");
            return Ok(None);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        tracing::info!("Embedding {} chunks with {}", texts.len(), embedder.model());

        let embed_start = Instant::now();
        let vectors = embed_all(embedder, &texts).await?;
        let embed_time = embed_start.elapsed();

        if vectors.is_empty() {
            return Ok(None);
        }

        let records = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| {
                VectorRecord::new(format!("doc_{}", i), vector, chunk.text).with_source(chunk.source)
            })
            .collect();

        Ok(Some(EmbeddedChunks {
            records,
            embed_time,
            dimension: embedder.dimensions(),
            embedding_model: embedder.model().to_string(),
        }))
    }

    /// Initialize `index_name` and write the embedded chunks into it
    pub async fn upload(
        &self,
        embedded: EmbeddedChunks,
        store: &dyn VectorStoreProvider,
        index_name: &str,
    ) -> Result<(IndexHandle, IngestStats)> {
        let upload_start = Instant::now();
        let handle = store
            .initialize_index(index_name, embedded.dimension, self.metric)
            .await?;
        let written = store.upsert(&handle, &embedded.records).await?;
        let upload_time = upload_start.elapsed();

        tracing::info!(
            "Stored {} records in {} index {} (embed {:.2?}, upload {:.2?})",
            written,
            store.name(),
            handle.name,
            embedded.embed_time,
            upload_time
        );

        Ok((
            handle.with_embedding_model(embedded.embedding_model),
            IngestStats {
                embed_time: embedded.embed_time,
                upload_time,
                chunk_count: embedded.records.len(),
            },
        ))
    }

    /// Chunk, embed and upsert `documents` into `index_name`
    ///
    /// Record ids are `doc_<i>` in chunk order, so re-ingesting into the same
    /// index overwrites rather than duplicates.
    pub async fn ingest(
        &self,
        documents: &[Document],
        embedder: &dyn EmbeddingProvider,
        store: &dyn VectorStoreProvider,
        index_name: &str,
    ) -> Result<IngestOutcome> {
        match self.embed_documents(documents, embedder).await? {
            Some(embedded) => {
                let (handle, stats) = self.upload(embedded, store, index_name).await?;
                Ok(IngestOutcome::Indexed { handle, stats })
            }
            None => Ok(IngestOutcome::NoData),
        }
    }
}
