use std::path::Path;

use lopdf::{Dictionary, Document, Object};

use catalogscan_core::{BackendError, DocumentInfo, PdfBackend};

/// Fallback [`PdfBackend`] built on lopdf.
///
/// Text comes from lopdf's content-stream walker, which handles simple
/// fonts well and loses layout. It is meant to sit behind MuPDF in the
/// backend list.
#[derive(Debug, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

fn load(path: &Path) -> Result<Document, BackendError> {
    if !path.exists() {
        return Err(BackendError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }
    Document::load(path).map_err(|e| BackendError::OpenError(e.to_string()))
}

fn is_encrypted(doc: &Document) -> bool {
    doc.trailer.get(b"Encrypt").is_ok()
}

/// The trailer's Info dictionary, following one indirect reference.
fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with a byte-order mark, otherwise
/// treated as Latin-1 compatible bytes.
fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn info_value(info: Option<&Dictionary>, key: &[u8]) -> Option<String> {
    let value = match info?.get(key).ok()? {
        Object::String(bytes, _) => decode_text(bytes),
        Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
        _ => return None,
    };
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn extract_pages(
        &self,
        path: &Path,
        max_pages: Option<usize>,
    ) -> Result<Vec<String>, BackendError> {
        let doc = load(path)?;
        if is_encrypted(&doc) {
            return Err(BackendError::Encrypted);
        }

        let page_numbers: Vec<u32> = doc
            .get_pages()
            .into_keys()
            .take(max_pages.unwrap_or(usize::MAX))
            .collect();

        let mut pages = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            let text = doc
                .extract_text(&[number])
                .map_err(|e| BackendError::ExtractionError(format!("page {number}: {e}")))?;
            pages.push(text);
        }
        Ok(pages)
    }

    fn document_info(&self, path: &Path) -> Result<DocumentInfo, BackendError> {
        let doc = load(path)?;
        let is_encrypted = is_encrypted(&doc);
        let info = if is_encrypted {
            None
        } else {
            info_dictionary(&doc)
        };

        Ok(DocumentInfo {
            page_count: doc.get_pages().len(),
            pdf_version: Some(doc.version.clone()).filter(|v| !v.is_empty()),
            is_encrypted,
            title: info_value(info, b"Title"),
            author: info_value(info, b"Author"),
            subject: info_value(info, b"Subject"),
            creator: info_value(info, b"Creator"),
            producer: info_value(info, b"Producer"),
            creation_date: info_value(info, b"CreationDate"),
            modification_date: info_value(info, b"ModDate"),
        })
    }
}
