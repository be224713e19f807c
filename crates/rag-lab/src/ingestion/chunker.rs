//! Sliding-window text chunking over whitespace tokens

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Token-window chunker with configurable size and overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    /// Window size in tokens
    chunk_size: usize,
    /// Tokens shared by consecutive windows
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    ///
    /// Fails with `InvalidConfiguration` unless `0 <= overlap < chunk_size`,
    /// since otherwise the window start never advances.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid_config("chunk size must be at least 1 token"));
        }
        if overlap >= chunk_size {
            return Err(Error::invalid_config(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into windows of `chunk_size` tokens
    ///
    /// Text of at most `chunk_size` tokens is returned whole and untouched.
    /// Longer text is re-joined with single spaces.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let tokens: Vec<&str> = text.split_whitespace().collect();

        if tokens.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::with_capacity(tokens.len() / step + 1);
        let mut start = 0usize;

        while start < tokens.len() {
            let end = (start + self.chunk_size).min(tokens.len());
            chunks.push(tokens[start..end].join(" "));
            start += step;
        }

        chunks
    }

    /// Chunk a document's concatenated pages, tagging each chunk with its source
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.chunk_text(&doc.full_text())
            .into_iter()
            .filter(|text| !text.trim().is_empty())
            .map(|text| Chunk::new(text, doc.id.clone()))
            .collect()
    }
}

/// Convenience wrapper: validate parameters and chunk in one call
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(TextChunker::new(chunk_size, overlap)?.chunk_text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let text = "Redis was created in  2009";
        let chunks = chunk(text, 100, 0).unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_sliding_windows() {
        let chunks = chunk("a b c d e f g", 3, 1).unwrap();
        assert_eq!(chunks, vec!["a b c", "c d e", "e f g", "g"]);
    }

    #[test]
    fn test_no_overlap_windows() {
        let chunks = chunk("a b c d e", 2, 0).unwrap();
        assert_eq!(chunks, vec!["a b", "c d", "e"]);
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_size_fails() {
        assert!(matches!(chunk("a b c", 2, 2), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(chunk("a b c", 100, 100), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(TextChunker::new(0, 0), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_chunk_document_tags_source() {
        let doc = Document::new(
            "redis.pdf",
            vec!["one two three".to_string(), "four five".to_string()],
        );
        let chunker = TextChunker::new(2, 0).unwrap();
        let chunks = chunker.chunk_document(&doc);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.source == "redis.pdf"));
        assert_eq!(chunks[2].text, "five");
    }

    #[test]
    fn test_blank_document_produces_no_chunks() {
        let doc = Document::new("blank.pdf", vec!["   ".to_string()]);
        let chunker = TextChunker::new(10, 0).unwrap();
        assert!(chunker.chunk_document(&doc).is_empty());
    }

    proptest! {
        #[test]
        fn prop_windows_reconstruct_tokens(
            words in prop::collection::vec("[a-z]{1,6}", 0..200),
            chunk_size in 1usize..40,
            overlap_seed in 0usize..40,
        ) {
            let overlap = overlap_seed % chunk_size;
            let text = words.join(" ");
            let tokens: Vec<&str> = text.split_whitespace().collect();
            let chunks = chunk(&text, chunk_size, overlap).unwrap();

            prop_assert!(!chunks.is_empty());

            if tokens.len() <= chunk_size {
                prop_assert_eq!(chunks.len(), 1);
                prop_assert_eq!(&chunks[0], &text);
            } else {
                let step = chunk_size - overlap;
                let mut rebuilt: Vec<&str> = Vec::new();
                let mut covered = 0usize;
                for (i, c) in chunks.iter().enumerate() {
                    let start = i * step;
                    let window: Vec<&str> = c.split(' ').collect();
                    prop_assert_eq!(
                        &window[..],
                        &tokens[start..(start + chunk_size).min(tokens.len())]
                    );
                    let skip = covered.saturating_sub(start);
                    rebuilt.extend(window.iter().skip(skip));
                    covered = start + window.len();
                }
                prop_assert_eq!(rebuilt, tokens);
            }
        }

        #[test]
        fn prop_chunking_is_deterministic(
            words in prop::collection::vec("[a-z]{1,6}", 0..100),
            chunk_size in 1usize..20,
        ) {
            let text = words.join(" ");
            let overlap = chunk_size / 2;
            prop_assert_eq!(
                chunk(&text, chunk_size, overlap).unwrap(),
                chunk(&text, chunk_size, overlap).unwrap()
            );
        }
    }
}
