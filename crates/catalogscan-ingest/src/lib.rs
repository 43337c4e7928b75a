//! Catalog ingestion.
//!
//! [`PdfIngestor`] turns file paths into [`PdfMetadata`] records: it checks
//! the file, hashes it, asks each configured [`PdfBackend`] in turn for
//! document properties and samples the first pages for text. Valid records
//! are cached in a JSON document keyed by path and reused while the file's
//! size and modification time are unchanged.

use thiserror::Error;

pub mod cache;
pub mod hash;
pub mod ingestor;
pub mod summary;

pub use cache::{MetadataCache, glob_to_regex};
pub use catalogscan_core::{PdfBackend, PdfMetadata, PdfStatus};
pub use hash::file_hash;
pub use ingestor::{PdfIngestor, SAMPLE_PAGES, find_pdfs};
pub use summary::{IngestSummary, MetadataExport};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid path pattern: {0}")]
    Pattern(#[from] regex::Error),
}
