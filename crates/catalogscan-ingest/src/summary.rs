use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use catalogscan_core::PdfMetadata;

/// Aggregate figures over a batch of ingested files.
///
/// Content figures (pages, size, text) cover valid files only; the status
/// distribution covers every file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub total_files: usize,
    pub valid_files: usize,
    pub error_files: usize,
    /// Percentage of valid files, one decimal place.
    pub success_rate: f64,
    pub total_pages: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub files_with_text: usize,
    pub avg_pages_per_file: f64,
    pub status_distribution: BTreeMap<String, usize>,
    pub backend_distribution: BTreeMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

impl IngestSummary {
    pub fn from_metadata(records: &[PdfMetadata]) -> Self {
        let valid: Vec<&PdfMetadata> = records.iter().filter(|m| m.is_valid()).collect();

        let mut status_distribution = BTreeMap::new();
        for record in records {
            *status_distribution
                .entry(record.status.as_str().to_string())
                .or_insert(0) += 1;
        }
        let mut backend_distribution = BTreeMap::new();
        for record in &valid {
            if let Some(backend) = &record.backend_used {
                *backend_distribution.entry(backend.clone()).or_insert(0) += 1;
            }
        }

        let total_pages: usize = valid.iter().map(|m| m.page_count).sum();
        let total_size_bytes: u64 = valid.iter().map(|m| m.file_size).sum();
        let success_rate = if records.is_empty() {
            0.0
        } else {
            round_to(valid.len() as f64 / records.len() as f64 * 100.0, 1)
        };
        let avg_pages_per_file = if valid.is_empty() {
            0.0
        } else {
            round_to(total_pages as f64 / valid.len() as f64, 1)
        };

        Self {
            total_files: records.len(),
            valid_files: valid.len(),
            error_files: records.len() - valid.len(),
            success_rate,
            total_pages,
            total_size_bytes,
            total_size_mb: round_to(total_size_bytes as f64 / 1024.0 / 1024.0, 2),
            files_with_text: valid.iter().filter(|m| m.has_text).count(),
            avg_pages_per_file,
            status_distribution,
            backend_distribution,
            generated_at: Utc::now(),
        }
    }
}

/// Document written by `PdfIngestor::export_metadata`.
#[derive(Debug, Serialize)]
pub struct MetadataExport<'a> {
    pub export_timestamp: DateTime<Utc>,
    pub total_files: usize,
    pub summary: IngestSummary,
    pub metadata: &'a [PdfMetadata],
}

impl<'a> MetadataExport<'a> {
    pub fn new(records: &'a [PdfMetadata]) -> Self {
        Self {
            export_timestamp: Utc::now(),
            total_files: records.len(),
            summary: IngestSummary::from_metadata(records),
            metadata: records,
        }
    }
}
