use std::path::Path;

use mupdf::{Document, MetadataName, Page, TextPageFlags};

use catalogscan_core::{BackendError, DocumentInfo, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the sole AGPL island. It isolates the mupdf dependency
/// (which is AGPL-3.0) so that non-PDF code paths do not transitively
/// depend on it.
#[derive(Debug, Default)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> Result<Document, BackendError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;
    if !path.exists() {
        return Err(BackendError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }
    Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))
}

fn open_unlocked(path: &Path) -> Result<Document, BackendError> {
    let document = open(path)?;
    let locked = document
        .needs_password()
        .map_err(|e| BackendError::OpenError(e.to_string()))?;
    if locked {
        return Err(BackendError::Encrypted);
    }
    Ok(document)
}

/// Plain text of one page, one output line per text line.
fn page_text(page: &Page) -> Result<String, BackendError> {
    let text_page = page
        .to_text_page(TextPageFlags::empty())
        .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

    let mut text = String::new();
    for block in text_page.blocks() {
        for line in block.lines() {
            text.extend(line.chars().map(|c| c.char().unwrap_or('\u{FFFD}')));
            text.push('\n');
        }
    }
    Ok(text)
}

fn metadata_value(document: &Document, name: MetadataName) -> Option<String> {
    document
        .metadata(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PdfBackend for MupdfBackend {
    fn name(&self) -> &str {
        "mupdf"
    }

    fn extract_pages(
        &self,
        path: &Path,
        max_pages: Option<usize>,
    ) -> Result<Vec<String>, BackendError> {
        let document = open_unlocked(path)?;
        let page_count = document
            .page_count()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
            .max(0) as usize;
        let limit = max_pages.map_or(page_count, |m| m.min(page_count));

        let mut pages = Vec::with_capacity(limit);
        for index in 0..limit {
            let page = document
                .load_page(index as i32)
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            pages.push(page_text(&page)?);
        }
        Ok(pages)
    }

    fn document_info(&self, path: &Path) -> Result<DocumentInfo, BackendError> {
        let document = open_unlocked(path)?;
        let page_count = document
            .page_count()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
            .max(0) as usize;

        // MuPDF reports the format as e.g. "PDF 1.7" and the encryption
        // scheme as "None" for unencrypted files.
        let pdf_version = metadata_value(&document, MetadataName::Format)
            .map(|f| f.trim_start_matches("PDF").trim().to_string());
        let is_encrypted = metadata_value(&document, MetadataName::Encryption)
            .is_some_and(|e| e != "None");

        Ok(DocumentInfo {
            page_count,
            pdf_version,
            is_encrypted,
            title: metadata_value(&document, MetadataName::Title),
            author: metadata_value(&document, MetadataName::Author),
            subject: metadata_value(&document, MetadataName::Subject),
            creator: metadata_value(&document, MetadataName::Creator),
            producer: metadata_value(&document, MetadataName::Producer),
            creation_date: metadata_value(&document, MetadataName::CreationDate),
            modification_date: metadata_value(&document, MetadataName::ModDate),
        })
    }
}
