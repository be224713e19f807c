//! Retrieval and answer generation over an indexed store

use crate::error::{Error, Result};
use crate::generation::prompt::{build_context, PromptTemplate};
use crate::providers::{EmbeddingProvider, LlmProvider, VectorStoreProvider};
use crate::types::{IndexHandle, SearchHit};

/// Chunks retrieved per question unless the caller asks otherwise
pub const DEFAULT_TOP_K: usize = 1;

/// Outcome of answering one question
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Model output, or a description of why generation failed
    pub text: String,
    /// Prompt sent to the model
    pub prompt: String,
    /// Retrieved chunks, most similar first
    pub passages: Vec<SearchHit>,
    /// Set when the model call failed and `text` is the error description
    pub generation_error: Option<String>,
}

impl Answer {
    /// Whether the text is an error description rather than model output
    pub fn is_degraded(&self) -> bool {
        self.generation_error.is_some()
    }
}

/// Reject an embedder that did not populate this index
pub fn check_pairing(handle: &IndexHandle, embedder: &dyn EmbeddingProvider) -> Result<()> {
    if handle.dimension != embedder.dimensions() {
        return Err(Error::invalid_config(format!(
            "index {} holds {}-dim vectors but {} produces {}",
            handle.name,
            handle.dimension,
            embedder.model(),
            embedder.dimensions()
        )));
    }
    if let Some(model) = handle.embedding_model.as_deref() {
        if model != embedder.model() {
            return Err(Error::invalid_config(format!(
                "index {} was populated with {} but queried with {}",
                handle.name,
                model,
                embedder.model()
            )));
        }
    }
    Ok(())
}

/// Embed the question and fetch the `top_k` most similar chunks
pub async fn retrieve(
    handle: &IndexHandle,
    store: &dyn VectorStoreProvider,
    embedder: &dyn EmbeddingProvider,
    question: &str,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    check_pairing(handle, embedder)?;

    let query = embedder.embed(question).await?;
    handle.check_dimension(&query)?;

    let hits = store.query(handle, &query, top_k).await?;
    tracing::debug!("Retrieved {} passages from {}", hits.len(), store.name());
    Ok(hits)
}

/// Retrieve context for `question` and ask the model
///
/// Retrieval failures propagate. A failed model call does not: the answer
/// text becomes a description of the failure and `generation_error` is set.
pub async fn answer(
    handle: &IndexHandle,
    store: &dyn VectorStoreProvider,
    embedder: &dyn EmbeddingProvider,
    question: &str,
    template: &PromptTemplate,
    llm: &dyn LlmProvider,
    top_k: usize,
) -> Result<Answer> {
    let passages = retrieve(handle, store, embedder, question, top_k).await?;
    let context = build_context(&passages);
    let prompt = template.render(question, &context);

    match llm.generate(&prompt).await {
        Ok(text) => Ok(Answer {
            text,
            prompt,
            passages,
            generation_error: None,
        }),
        Err(e) => {
            tracing::warn!("{} ({}) failed to answer: {}", llm.name(), llm.model(), e);
            Ok(Answer {
                text: format!("Error generating response: {}", e),
                prompt,
                passages,
                generation_error: Some(e.to_string()),
            })
        }
    }
}
