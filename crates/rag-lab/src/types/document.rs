//! Document and chunk types with provenance tracking

use serde::{Deserialize, Serialize};

/// A loaded source document: its filename plus ordered page texts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Source filename, used as the document id
    pub id: String,
    /// Page texts in reading order
    pub pages: Vec<String>,
}

impl Document {
    /// Create a document from its pages
    pub fn new(id: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            id: id.into(),
            pages,
        }
    }

    /// Concatenate all pages, each followed by a single space
    pub fn full_text(&self) -> String {
        let capacity = self.pages.iter().map(|p| p.len() + 1).sum();
        let mut text = String::with_capacity(capacity);
        for page in &self.pages {
            text.push_str(page);
            text.push(' ');
        }
        text
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// A token window of a document's concatenated text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Window text, tokens joined by single spaces
    pub text: String,
    /// Id of the document this chunk came from
    pub source: String,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}
