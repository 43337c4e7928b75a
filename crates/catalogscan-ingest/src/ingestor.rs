use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use catalogscan_core::{
    BackendError, DocumentInfo, PdfBackend, PdfMetadata, PdfStatus, parse_pdf_date,
};

use crate::IngestError;
use crate::cache::MetadataCache;
use crate::hash::{file_hash, has_pdf_header};
use crate::summary::{IngestSummary, MetadataExport};

/// Pages inspected for text when estimating content.
pub const SAMPLE_PAGES: usize = 10;

/// Validates PDF files, reads their metadata through the backend list and
/// keeps a JSON cache of valid results.
pub struct PdfIngestor {
    backends: Vec<Arc<dyn PdfBackend>>,
    cache: MetadataCache,
}

fn file_stat(path: &Path) -> Result<(u64, DateTime<Utc>), (PdfStatus, String)> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Err((PdfStatus::PermissionDenied, "no read permission".into()));
        }
        Err(_) => return Err((PdfStatus::NotFound, "file not found".into())),
    };
    if !meta.is_file() {
        return Err((PdfStatus::NotFound, "not a regular file".into()));
    }
    let mtime = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
    Ok((meta.len(), mtime))
}

fn io_failure(e: &io::Error) -> (PdfStatus, String) {
    if e.kind() == io::ErrorKind::PermissionDenied {
        (PdfStatus::PermissionDenied, "no read permission".into())
    } else {
        (PdfStatus::Corrupted, e.to_string())
    }
}

fn apply_info(meta: &mut PdfMetadata, info: DocumentInfo) {
    meta.page_count = info.page_count;
    meta.pdf_version = info.pdf_version;
    meta.is_encrypted = info.is_encrypted;
    meta.creation_date = info.creation_date.as_deref().and_then(parse_pdf_date);
    meta.modification_date = info.modification_date.as_deref().and_then(parse_pdf_date);
    meta.title = info.title;
    meta.author = info.author;
    meta.subject = info.subject;
    meta.creator = info.creator;
    meta.producer = info.producer;
}

/// Pages with text in the sample, scaled up to the full document when the
/// sample didn't cover it.
fn estimate_text_pages(text_pages: usize, sampled: usize, page_count: usize) -> usize {
    if page_count > sampled && sampled > 0 {
        (text_pages as f64 / sampled as f64 * page_count as f64) as usize
    } else {
        text_pages
    }
}

/// Every `.pdf` file (case-insensitive extension) under `dir`, sorted.
pub fn find_pdfs(dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
                && path.is_file()
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

impl PdfIngestor {
    /// Build an ingestor over `backends` (tried in order), loading any
    /// existing cache document at `cache_path`.
    pub fn new(backends: Vec<Arc<dyn PdfBackend>>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            backends,
            cache: MetadataCache::load(cache_path),
        }
    }

    pub fn backends(&self) -> &[Arc<dyn PdfBackend>] {
        &self.backends
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Metadata for one file, from the cache when the file is unchanged.
    ///
    /// Never fails: problems are reported through `status` and
    /// `error_message`. Only valid results enter the cache.
    pub fn ingest_file(&self, path: &Path, force_refresh: bool) -> PdfMetadata {
        let (size, mtime) = match file_stat(path) {
            Ok(stat) => stat,
            Err((status, message)) => {
                tracing::warn!(path = %path.display(), status = %status, error = %message, "pdf ingest failed");
                return PdfMetadata::new(path, 0, "", Utc::now()).with_failure(status, message);
            }
        };

        if !force_refresh {
            if let Some(cached) = self.cache.get_fresh(path, size, mtime) {
                tracing::debug!(path = %path.display(), "using cached metadata");
                return cached;
            }
        }

        let metadata = self.inspect(path, size, mtime);
        if self.cache.insert(&metadata) {
            tracing::info!(
                file = %metadata.file_name(),
                pages = metadata.page_count,
                size_bytes = metadata.file_size,
                has_text = metadata.has_text,
                backend = metadata.backend_used.as_deref().unwrap_or(""),
                "pdf ingested"
            );
        } else {
            tracing::warn!(
                file = %metadata.file_name(),
                status = %metadata.status,
                error = metadata.error_message.as_deref().unwrap_or(""),
                "pdf ingest failed"
            );
        }
        metadata
    }

    /// Classify and read a file that is known to exist.
    fn inspect(&self, path: &Path, size: u64, mtime: DateTime<Utc>) -> PdfMetadata {
        let hash = match file_hash(path) {
            Ok(hash) => hash,
            Err(e) => {
                let (status, message) = io_failure(&e);
                return PdfMetadata::new(path, size, "", mtime).with_failure(status, message);
            }
        };
        let mut metadata = PdfMetadata::new(path, size, hash, mtime);

        if self.backends.is_empty() {
            return metadata.with_failure(PdfStatus::Unsupported, "no PDF backends available");
        }
        match has_pdf_header(path) {
            Ok(true) => {}
            Ok(false) => {
                return metadata.with_failure(PdfStatus::Unsupported, "missing %PDF- header");
            }
            Err(e) => {
                let (status, message) = io_failure(&e);
                return metadata.with_failure(status, message);
            }
        }

        let mut last_err = None;
        for backend in &self.backends {
            match backend.document_info(path) {
                Ok(info) => {
                    apply_info(&mut metadata, info);
                    metadata.backend_used = Some(backend.name().to_string());
                    self.sample_text(backend.as_ref(), path, &mut metadata);
                    return metadata;
                }
                Err(BackendError::Encrypted) => {
                    metadata.is_encrypted = true;
                    metadata.backend_used = Some(backend.name().to_string());
                    return metadata.with_failure(
                        PdfStatus::Encrypted,
                        BackendError::Encrypted.to_string(),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        path = %path.display(),
                        error = %e,
                        "backend could not read document, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        let message = last_err.map_or_else(|| "unreadable PDF".to_string(), |e| e.to_string());
        metadata.with_failure(PdfStatus::Corrupted, message)
    }

    fn sample_text(&self, backend: &dyn PdfBackend, path: &Path, metadata: &mut PdfMetadata) {
        match backend.extract_pages(path, Some(SAMPLE_PAGES)) {
            Ok(pages) => {
                let text_pages = pages.iter().filter(|p| !p.trim().is_empty()).count();
                metadata.has_text = text_pages > 0;
                metadata.estimated_text_pages =
                    estimate_text_pages(text_pages, pages.len(), metadata.page_count);
            }
            Err(e) => {
                tracing::warn!(
                    backend = backend.name(),
                    path = %path.display(),
                    error = %e,
                    "text sampling failed"
                );
            }
        }
    }

    /// Ingest every PDF in `dir` and persist the cache afterwards.
    ///
    /// A missing directory or one without PDFs yields an empty list.
    pub fn ingest_directory(
        &self,
        dir: &Path,
        recursive: bool,
        force_refresh: bool,
    ) -> Vec<PdfMetadata> {
        if !dir.is_dir() {
            tracing::error!(dir = %dir.display(), "directory does not exist");
            return Vec::new();
        }
        let files = match find_pdfs(dir, recursive) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "could not list directory");
                return Vec::new();
            }
        };
        if files.is_empty() {
            tracing::warn!(dir = %dir.display(), "no PDF files found");
            return Vec::new();
        }

        tracing::info!(dir = %dir.display(), files = files.len(), "starting directory ingest");
        let results: Vec<PdfMetadata> = files
            .iter()
            .map(|file| self.ingest_file(file, force_refresh))
            .collect();

        if let Err(e) = self.save_cache() {
            tracing::error!(path = %self.cache.path().display(), error = %e, "could not save metadata cache");
        }

        let valid = results.iter().filter(|m| m.is_valid()).count();
        tracing::info!(
            total = results.len(),
            valid,
            errors = results.len() - valid,
            "directory ingest complete"
        );
        results
    }

    pub fn summary(&self, records: &[PdfMetadata]) -> IngestSummary {
        IngestSummary::from_metadata(records)
    }

    /// Remove cache entries (all, or those whose path matches the glob)
    /// and persist the result.
    pub fn clear_cache(&self, pattern: Option<&str>) -> Result<usize, IngestError> {
        let removed = self.cache.remove_matching(pattern)?;
        self.save_cache()?;
        tracing::info!(removed, "metadata cache cleared");
        Ok(removed)
    }

    /// Write records plus their summary as a pretty-printed JSON document.
    pub fn export_metadata(&self, output: &Path, records: &[PdfMetadata]) -> Result<(), IngestError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&MetadataExport::new(records))?;
        std::fs::write(output, json)?;
        tracing::info!(path = %output.display(), files = records.len(), "metadata exported");
        Ok(())
    }

    pub fn save_cache(&self) -> Result<(), IngestError> {
        self.cache.save()
    }
}
