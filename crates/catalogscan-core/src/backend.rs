use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("document is password protected")]
    Encrypted,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document-level properties reported by a backend.
///
/// Info-dictionary values are passed through raw; date strings keep the PDF
/// `D:YYYYMMDDHHmmSS` form and are parsed by the ingest layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub pdf_version: Option<String>,
    pub is_encrypted: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Trait for PDF text extraction backends.
///
/// Implementors wrap one PDF library. Callers hold a prioritized list of
/// backends and fall through to the next one when a call fails, so an
/// implementation should return an error rather than partial output when
/// the document cannot be read.
pub trait PdfBackend: Send + Sync {
    /// Short identifier used in logs and in `PdfMetadata::backend_used`.
    fn name(&self) -> &str;

    /// Extract plain text for the first `max_pages` pages (all pages when
    /// `None`), one entry per page in page order. Pages without text yield
    /// an empty string.
    fn extract_pages(&self, path: &Path, max_pages: Option<usize>)
    -> Result<Vec<String>, BackendError>;

    /// Read page count, version and info-dictionary properties.
    fn document_info(&self, path: &Path) -> Result<DocumentInfo, BackendError>;
}
