//! Prompt templates for RAG generation

use serde::{Deserialize, Serialize};

use crate::types::SearchHit;

/// Placeholder replaced by the question
pub const QUERY_PLACEHOLDER: &str = "{user_query}";
/// Placeholder replaced by the retrieved context block
pub const PASSAGE_PLACEHOLDER: &str = "{retrieved_passage}";
/// Context used when retrieval returns nothing
pub const NO_CONTEXT: &str = "No relevant documents found.";

/// A prompt template in one of two styles
///
/// Placeholder style contains `{user_query}` and/or `{retrieved_passage}`,
/// which are substituted. Preamble style has neither: the template text is
/// followed by the context block and then the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Whether the template carries substitution placeholders
    pub fn is_placeholder_style(&self) -> bool {
        self.template.contains(QUERY_PLACEHOLDER) || self.template.contains(PASSAGE_PLACEHOLDER)
    }

    /// Assemble the final prompt
    pub fn render(&self, question: &str, context: &str) -> String {
        if self.is_placeholder_style() {
            self.template
                .replace(PASSAGE_PLACEHOLDER, context)
                .replace(QUERY_PLACEHOLDER, question)
        } else {
            format!(
                "{}\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
                self.template.trim_end(),
                context,
                question
            )
        }
    }
}

impl From<&str> for PromptTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for PromptTemplate {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}

/// Join retrieved texts with a paragraph separator
pub fn build_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }
    hits.iter()
        .map(|hit| hit.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            id: "doc_0".to_string(),
            text: text.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_placeholder_substitution() {
        let template = PromptTemplate::new("Context: {retrieved_passage}\nQ: {user_query}");
        assert!(template.is_placeholder_style());
        let prompt = template.render("When was Redis created?", "Redis was created in 2009");
        assert_eq!(prompt, "Context: Redis was created in 2009\nQ: When was Redis created?");
    }

    #[test]
    fn test_preamble_style_concatenates() {
        let template = PromptTemplate::new("Answer the question based on the context provided below:");
        assert!(!template.is_placeholder_style());
        let prompt = template.render("How many databases can Redis have?", "Redis has 16 databases");
        assert!(prompt.starts_with("Answer the question based on the context provided below:"));
        let ctx = prompt.find("Redis has 16 databases").unwrap();
        let q = prompt.find("How many databases can Redis have?").unwrap();
        assert!(ctx < q);
    }

    #[test]
    fn test_context_joins_with_blank_line() {
        let context = build_context(&[hit("first"), hit("second")]);
        assert_eq!(context, "first\n\nsecond");
    }

    #[test]
    fn test_empty_context_placeholder() {
        assert_eq!(build_context(&[]), NO_CONTEXT);
    }
}
