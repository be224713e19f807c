//! Indexed records, search hits and index handles shared by all vector stores

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Provenance metadata stored alongside each record
pub type RecordMetadata = BTreeMap<String, String>;

/// Metadata key holding the source document id
pub const SOURCE_KEY: &str = "source";

/// Similarity metric an index is created with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity (the convention for every index in this crate)
    #[default]
    Cosine,
}

impl SimilarityMetric {
    /// Score two vectors of equal length; higher is more similar
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot / (norm_a * norm_b)
                }
            }
        }
    }

    /// Name used in configuration and backend APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
        }
    }
}

/// Handle to an initialized index
///
/// Carries everything a later upsert/query needs to verify it is talking to
/// the index it thinks it is: dimension, metric, and the embedding model the
/// index was populated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHandle {
    /// Index name
    pub name: String,
    /// Vector dimensionality every record must have
    pub dimension: usize,
    /// Similarity metric
    pub metric: SimilarityMetric,
    /// Backend-specific data-plane endpoint (Pinecone index host)
    pub endpoint: Option<String>,
    /// Embedding model the index was populated with
    pub embedding_model: Option<String>,
}

impl IndexHandle {
    /// Create a handle
    pub fn new(name: impl Into<String>, dimension: usize, metric: SimilarityMetric) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric,
            endpoint: None,
            embedding_model: None,
        }
    }

    /// Attach the data-plane endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Record which embedding model populated this index
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Check a vector against the index dimension
    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Check every record against the index dimension
    pub fn check_records(&self, records: &[VectorRecord]) -> Result<()> {
        records
            .iter()
            .try_for_each(|record| self.check_dimension(&record.vector))
    }
}

/// A record persisted in a vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique id (`doc_<i>` in insertion order)
    pub id: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Chunk text
    pub text: String,
    /// Provenance metadata
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    /// Create a record
    pub fn new(id: impl Into<String>, vector: Vec<f32>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vector,
            text: text.into(),
            metadata: RecordMetadata::new(),
        }
    }

    /// Attach the source document id
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.insert(SOURCE_KEY.to_string(), source.into());
        self
    }

    /// Source document id, if recorded
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// One query match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Record id
    pub id: String,
    /// Record text
    pub text: String,
    /// Similarity score, higher is more similar
    pub score: f32,
}

/// Sort hits most-similar first and keep `top_k`
pub fn rank_hits(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_score() {
        let metric = SimilarityMetric::Cosine;
        assert!((metric.score(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(metric.score(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(metric.score(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_check_dimension() {
        let handle = IndexHandle::new("ds4300", 3, SimilarityMetric::Cosine);
        assert!(handle.check_dimension(&[0.1, 0.2, 0.3]).is_ok());
        match handle.check_dimension(&[0.1, 0.2]) {
            Err(Error::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rank_hits_orders_and_truncates() {
        let hits = vec![
            SearchHit { id: "doc_0".into(), text: "a".into(), score: 0.2 },
            SearchHit { id: "doc_1".into(), text: "b".into(), score: 0.9 },
            SearchHit { id: "doc_2".into(), text: "c".into(), score: 0.5 },
        ];
        let ranked = rank_hits(hits, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "doc_1");
        assert_eq!(ranked[1].id, "doc_2");
    }

    #[test]
    fn test_record_source() {
        let record = VectorRecord::new("doc_0", vec![0.0; 4], "text").with_source("notes.pdf");
        assert_eq!(record.source(), Some("notes.pdf"));
    }
}
