//! LLM generation and prompt assembly

pub mod ollama;
pub mod prompt;

pub use ollama::OllamaClient;
pub use prompt::{build_context, PromptTemplate};
