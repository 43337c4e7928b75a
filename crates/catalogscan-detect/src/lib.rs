//! Vendor detection for auto-parts PDF catalogs.
//!
//! Pipeline:
//! 1. Pull page text through a [`TextExtractor`] (prioritized backends)
//! 2. Score the joined text against every vendor's [`DetectionSignature`]s
//! 3. Pick the best-scoring vendor, or GENERIC at 0.3 when nothing qualifies
//! 4. Attach evidence and a per-page breakdown of the first pages

pub mod detector;
pub mod extractor;
pub mod global;
pub mod page_analysis;
pub mod result;
pub mod signatures;

pub use detector::{DetectionStats, GENERIC_FALLBACK_CONFIDENCE, VendorDetector};
pub use extractor::{PageTexts, TextExtractor};
pub use page_analysis::PageAnalysis;
pub use result::{
    AnalysisSummary, ConfidenceLevel, DetectionResult, Evidence, PatternsFound, SignatureDetail,
};
pub use signatures::{
    ConfigError, DetectionSignature, SignatureConfig, SignatureSource, SignatureSpec,
    SignatureStore, StaticSignatureSource, TomlSignatureSource, VendorSignatures,
    default_signature_config,
};
// Re-export domain types from core (canonical definitions live there)
pub use catalogscan_core::{PdfBackend, PdfMetadata, PdfStatus, VendorType};
