use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use catalogscan_core::{BackendError, PdfBackend};

/// Page texts keyed by zero-based page index.
pub type PageTexts = BTreeMap<usize, String>;

/// Extracts page text through a prioritized list of backends.
///
/// Backends are tried in order; the first one that succeeds supplies the
/// whole result. There is no per-page mixing between backends.
#[derive(Clone, Default)]
pub struct TextExtractor {
    backends: Vec<Arc<dyn PdfBackend>>,
}

impl TextExtractor {
    pub fn new(backends: Vec<Arc<dyn PdfBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Text of the first `max_pages` pages (all when `None`).
    ///
    /// Failures are logged, never returned: when every backend fails the map
    /// is empty.
    pub fn extract_pages(&self, path: &Path, max_pages: Option<usize>) -> PageTexts {
        match self.try_extract(path, max_pages) {
            Ok((_, pages)) => pages,
            Err(_) => PageTexts::new(),
        }
    }

    /// Like [`extract_pages`](Self::extract_pages) but reports which backend
    /// succeeded, or the last backend error when none did.
    pub fn try_extract(
        &self,
        path: &Path,
        max_pages: Option<usize>,
    ) -> Result<(String, PageTexts), BackendError> {
        let mut last_err = BackendError::ExtractionError("no PDF backends configured".into());

        for backend in &self.backends {
            match backend.extract_pages(path, max_pages) {
                Ok(pages) => {
                    tracing::debug!(
                        backend = backend.name(),
                        path = %path.display(),
                        pages = pages.len(),
                        "text extracted"
                    );
                    let pages: PageTexts = pages.into_iter().enumerate().collect();
                    return Ok((backend.name().to_string(), pages));
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        path = %path.display(),
                        error = %e,
                        "backend failed, trying next"
                    );
                    last_err = e;
                }
            }
        }

        tracing::error!(path = %path.display(), "could not extract text from PDF");
        Err(last_err)
    }
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor")
            .field("backends", &self.backend_names())
            .finish()
    }
}
