use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod backend;
pub mod config_file;

// Re-export for convenience
pub use backend::{BackendError, DocumentInfo, PdfBackend};
pub use config_file::ConfigFile;

/// Catalog vendors the detector knows about.
///
/// The set is closed: adding a vendor means adding a variant here and
/// signatures for it. Declaration order doubles as the tie-break order when
/// two vendors score the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorType {
    Depo,
    Yuto,
    Hushan,
    Generic,
    Unknown,
}

impl VendorType {
    pub const ALL: [VendorType; 5] = [
        VendorType::Depo,
        VendorType::Yuto,
        VendorType::Hushan,
        VendorType::Generic,
        VendorType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorType::Depo => "depo",
            VendorType::Yuto => "yuto",
            VendorType::Hushan => "hushan",
            VendorType::Generic => "generic",
            VendorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown vendor: {0}")]
pub struct UnknownVendor(pub String);

impl FromStr for VendorType {
    type Err = UnknownVendor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        VendorType::ALL
            .into_iter()
            .find(|v| v.as_str() == lower)
            .ok_or_else(|| UnknownVendor(s.to_string()))
    }
}

/// Outcome of validating a PDF file during ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfStatus {
    Valid,
    Corrupted,
    Encrypted,
    Unsupported,
    NotFound,
    PermissionDenied,
}

impl PdfStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfStatus::Valid => "valid",
            PdfStatus::Corrupted => "corrupted",
            PdfStatus::Encrypted => "encrypted",
            PdfStatus::Unsupported => "unsupported",
            PdfStatus::NotFound => "not_found",
            PdfStatus::PermissionDenied => "permission_denied",
        }
    }
}

impl fmt::Display for PdfStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata gathered for one PDF file.
///
/// `status` gates everything downstream: detection and year parsing only
/// run on [`PdfStatus::Valid`] documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub file_path: PathBuf,
    pub file_size: u64,
    /// SHA-256 of the file contents, lowercase hex. Empty when the file
    /// could not be read.
    pub file_hash: String,
    pub modified_time: DateTime<Utc>,

    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<NaiveDateTime>,
    pub modification_date: Option<NaiveDateTime>,

    pub page_count: usize,
    pub pdf_version: Option<String>,
    pub is_encrypted: bool,
    pub has_text: bool,
    pub estimated_text_pages: usize,

    pub backend_used: Option<String>,
    pub status: PdfStatus,
    pub error_message: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl PdfMetadata {
    /// A valid record with only the file-level fields filled in.
    pub fn new(
        file_path: impl Into<PathBuf>,
        file_size: u64,
        file_hash: impl Into<String>,
        modified_time: DateTime<Utc>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            file_size,
            file_hash: file_hash.into(),
            modified_time,
            title: None,
            author: None,
            subject: None,
            creator: None,
            producer: None,
            creation_date: None,
            modification_date: None,
            page_count: 0,
            pdf_version: None,
            is_encrypted: false,
            has_text: false,
            estimated_text_pages: 0,
            backend_used: None,
            status: PdfStatus::Valid,
            error_message: None,
            ingested_at: Utc::now(),
        }
    }

    /// Mark this record as failed with the given status and reason.
    pub fn with_failure(mut self, status: PdfStatus, message: impl Into<String>) -> Self {
        self.status = status;
        self.error_message = Some(message.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.status == PdfStatus::Valid
    }

    /// Display name for logs: the file name, or the full path if it has none.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSS[+HH'mm']`).
///
/// Only the first fourteen digits are used; the timezone suffix is ignored.
/// Returns `None` for anything that doesn't carry a full timestamp.
pub fn parse_pdf_date(raw: &str) -> Option<NaiveDateTime> {
    let digits = raw.trim().strip_prefix("D:")?;
    let stamp = digits.get(..14)?;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S").ok()
}
