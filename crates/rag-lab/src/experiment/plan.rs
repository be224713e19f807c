//! Sweep axes shared by every backend phase

use crate::config::ExperimentConfig;
use crate::generation::PromptTemplate;
use crate::providers::VectorBackend;
use crate::types::RunConfig;

/// The query-side and chunking axes of the configuration grid
///
/// Backends and embedding models are not part of the plan: each backend
/// phase brings its own store and embedder.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    /// Logical index name used on every backend
    pub index_name: String,
    /// Chunks retrieved per question
    pub top_k: usize,
    pub chunk_sizes: Vec<usize>,
    pub overlaps: Vec<usize>,
    pub prompts: Vec<PromptTemplate>,
    pub questions: Vec<String>,
}

impl SweepPlan {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            index_name: config.index_name.clone(),
            top_k: config.top_k,
            chunk_sizes: config.chunk_sizes.clone(),
            overlaps: config.overlaps.clone(),
            prompts: config.prompts.iter().map(|p| PromptTemplate::from(p.as_str())).collect(),
            questions: config.questions.clone(),
        }
    }

    /// Runs per language model within one backend phase
    pub fn runs_per_model(&self) -> usize {
        self.chunk_sizes.len() * self.overlaps.len() * self.prompts.len() * self.questions.len()
    }
}

/// Identity of one grid point, before it runs
#[derive(Debug, Clone, Copy)]
pub struct GridPoint<'a> {
    pub embedding_model: &'a str,
    pub database: VectorBackend,
    pub llm_model: &'a str,
    pub chunk_size: usize,
    pub overlap: usize,
    pub prompt: &'a PromptTemplate,
    pub question: &'a str,
}

impl GridPoint<'_> {
    pub fn to_config(&self) -> RunConfig {
        RunConfig {
            embedding_model: self.embedding_model.to_string(),
            database: self.database,
            llm_model: self.llm_model.to_string(),
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            prompt: self.prompt.as_str().to_string(),
            question: self.question.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_from_default_config() {
        let config = ExperimentConfig::default();
        let plan = SweepPlan::from_config(&config);
        assert_eq!(plan.top_k, 1);
        let prompts: Vec<&str> = plan.prompts.iter().map(|p| p.as_str()).collect();
        assert_eq!(prompts, config.prompts);
        assert_eq!(plan.runs_per_model(), 2 * 2 * 2 * 4);
        assert!(plan.prompts.iter().all(|p| !p.is_placeholder_style()));
    }

    #[test]
    fn test_grid_point_config() {
        let prompt = PromptTemplate::new("Answer:");
        let point = GridPoint {
            embedding_model: "nomic-embed-text",
            database: VectorBackend::Redis,
            llm_model: "llama3.2",
            chunk_size: 500,
            overlap: 100,
            prompt: &prompt,
            question: "How many databases can Redis have?",
        };
        let config = point.to_config();
        assert_eq!(config.database, VectorBackend::Redis);
        assert_eq!(config.prompt, "Answer:");
        assert_eq!(config.chunk_size, 500);
    }
}
