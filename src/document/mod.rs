//! PDF text extraction.
//!
//! Uploads are staged to a temporary file and handed to a [`DocumentLoader`], which returns one
//! [`PageText`] per page in document order. Extraction is synchronous; callers run it on the
//! blocking pool.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised while extracting text from a document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file could not be parsed as a PDF.
    #[error("Failed to parse PDF: {0}")]
    Parse(String),
    /// The document parsed but produced no text at all.
    #[error("Document contains no extractable text")]
    NoText,
}

/// Text of a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number.
    pub number: u32,
    /// Extracted text.
    pub text: String,
}

impl PageText {
    /// Convenience constructor.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Turns a staged document into page-level text segments.
pub trait DocumentLoader: Send + Sync {
    /// Load the file at `path` and return its pages in order.
    fn load(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError>;
}

/// [`DocumentLoader`] backed by `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError> {
        let document =
            lopdf::Document::load(path).map_err(|error| ExtractionError::Parse(error.to_string()))?;

        let extracted = document
            .get_pages()
            .into_keys()
            .map(|number| (number, document.extract_text(&[number])));
        collect_pages(extracted)
    }
}

/// Keep the pages that extracted cleanly, in order.
///
/// A page whose text cannot be decoded is logged and left out; the document only fails when no
/// page yields any text.
fn collect_pages<E: std::fmt::Display>(
    extracted: impl IntoIterator<Item = (u32, Result<String, E>)>,
) -> Result<Vec<PageText>, ExtractionError> {
    let mut pages = Vec::new();
    let mut skipped = 0usize;
    for (number, result) in extracted {
        match result {
            Ok(text) => pages.push(PageText::new(number, text)),
            Err(error) => {
                skipped += 1;
                tracing::debug!(page = number, %error, "Skipping page without extractable text");
            }
        }
    }

    if pages.iter().all(|page| page.text.trim().is_empty()) {
        return Err(ExtractionError::NoText);
    }

    tracing::debug!(pages = pages.len(), skipped, "Extracted PDF text");
    Ok(pages)
}

/// Write uploaded bytes to a named temporary file that is removed on drop.
pub fn stage_upload(bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("docuquery-")
        .suffix(".pdf")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}
