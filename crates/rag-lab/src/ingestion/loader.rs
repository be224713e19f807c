//! Directory document loader
//!
//! Reads every regular file at the top level of a directory. PDFs are split
//! into pages, plain text and markdown become a single page. A file that
//! fails to load is logged and skipped; loading continues with the rest.

use std::path::Path;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::Document;

/// Loader for a directory of source documents
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load all supported documents in `dir`, sorted by filename
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Document>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::DocumentLoad {
                path: dir.display().to_string(),
                message: "not a directory".to_string(),
            });
        }

        tracing::info!("Loading documents from {}", dir.display());

        let mut documents = Vec::new();
        let entries = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().to_string();
            match Self::load_file(entry.path()) {
                Ok(Some(doc)) => {
                    tracing::info!("Loaded {} ({} pages)", filename, doc.page_count());
                    documents.push(doc);
                }
                Ok(None) => {
                    tracing::debug!("Skipping unsupported file {}", filename);
                }
                Err(e) => {
                    tracing::warn!("Error processing {}: {}", filename, e);
                }
            }
        }

        tracing::info!("Loaded {} documents", documents.len());
        Ok(documents)
    }

    /// Load one file; `Ok(None)` for unsupported extensions
    pub fn load_file(path: &Path) -> Result<Option<Document>> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let pages = match extension.as_str() {
            "pdf" => Self::pdf_pages(path)?,
            "txt" | "text" | "md" | "markdown" => vec![std::fs::read_to_string(path)?],
            _ => return Ok(None),
        };

        Ok(Some(Document::new(filename, pages)))
    }

    /// Extract text page by page
    fn pdf_pages(path: &Path) -> Result<Vec<String>> {
        let load_err = |message: String| Error::DocumentLoad {
            path: path.display().to_string(),
            message,
        };

        let doc = lopdf::Document::load(path).map_err(|e| load_err(e.to_string()))?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(text) => pages.push(text.replace('\0', "")),
                Err(e) => {
                    tracing::debug!("Could not extract page {} of {}: {}", page_number, path.display(), e);
                    pages.push(String::new());
                }
            }
        }

        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(load_err("no extractable text (image-based or encrypted PDF)".to_string()));
        }

        Ok(pages)
    }
}
