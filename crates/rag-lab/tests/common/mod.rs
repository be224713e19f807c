//! In-process providers shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rag_lab::providers::{LocalVectorStore, VectorBackend};
use rag_lab::{
    Error, IndexHandle, LlmProvider, Result, SearchHit, SimilarityMetric, VectorRecord, VectorStoreProvider,
};

/// Answers with a fixed reply and remembers every prompt it was given
pub struct ScriptedLlm {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-llm"
    }
}

/// A store whose writes never land
pub struct FailingStore;

#[async_trait]
impl VectorStoreProvider for FailingStore {
    async fn initialize_index(&self, name: &str, dimension: usize, metric: SimilarityMetric) -> Result<IndexHandle> {
        Ok(IndexHandle::new(name, dimension, metric))
    }

    async fn upsert(&self, _index: &IndexHandle, records: &[VectorRecord]) -> Result<usize> {
        Err(Error::upload(
            "redis",
            records.len(),
            records.len(),
            "connection reset by peer",
        ))
    }

    async fn query(&self, _index: &IndexHandle, _vector: &[f32], _top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    async fn clear(&self, _index: &IndexHandle) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn backend(&self) -> VectorBackend {
        VectorBackend::Redis
    }
}

/// A local store that counts `clear` calls and, on every query, notes how
/// many records the index holds
pub struct RecordingStore {
    inner: LocalVectorStore,
    clears: AtomicUsize,
    sizes_at_query: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn new(inner: LocalVectorStore) -> Self {
        Self {
            inner,
            clears: AtomicUsize::new(0),
            sizes_at_query: Mutex::new(Vec::new()),
        }
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn sizes_at_query(&self) -> Vec<usize> {
        self.sizes_at_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStoreProvider for RecordingStore {
    async fn initialize_index(&self, name: &str, dimension: usize, metric: SimilarityMetric) -> Result<IndexHandle> {
        self.inner.initialize_index(name, dimension, metric).await
    }

    async fn upsert(&self, index: &IndexHandle, records: &[VectorRecord]) -> Result<usize> {
        self.inner.upsert(index, records).await
    }

    async fn query(&self, index: &IndexHandle, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let everything = self.inner.query(index, vector, usize::MAX).await?;
        self.sizes_at_query.lock().unwrap().push(everything.len());
        self.inner.query(index, vector, top_k).await
    }

    async fn clear(&self, index: &IndexHandle) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear(index).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    fn backend(&self) -> VectorBackend {
        self.inner.backend()
    }
}
