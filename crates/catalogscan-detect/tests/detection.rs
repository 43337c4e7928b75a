use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use catalogscan_core::{
    BackendError, DocumentInfo, PdfBackend, PdfMetadata, PdfStatus, VendorType,
};
use catalogscan_detect::{ConfidenceLevel, SignatureStore, TextExtractor, VendorDetector};
use chrono::Utc;

/// Backend that serves canned pages and counts extraction calls.
struct MockBackend {
    pages: Option<Vec<String>>,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    fn serving(pages: &[&str]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = Self {
            pages: Some(pages.iter().map(|p| p.to_string()).collect()),
            calls: calls.clone(),
        };
        (backend, calls)
    }

    fn failing() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = Self {
            pages: None,
            calls: calls.clone(),
        };
        (backend, calls)
    }
}

impl PdfBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn extract_pages(
        &self,
        _path: &Path,
        max_pages: Option<usize>,
    ) -> Result<Vec<String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.pages {
            Some(pages) => Ok(pages
                .iter()
                .take(max_pages.unwrap_or(usize::MAX))
                .cloned()
                .collect()),
            None => Err(BackendError::ExtractionError("mock failure".into())),
        }
    }

    fn document_info(&self, _path: &Path) -> Result<DocumentInfo, BackendError> {
        Ok(DocumentInfo::default())
    }
}

fn detector_with(backend: MockBackend) -> VendorDetector {
    VendorDetector::new(
        Arc::new(SignatureStore::defaults()),
        TextExtractor::new(vec![Arc::new(backend)]),
    )
}

fn metadata(name: &str, hash: &str) -> PdfMetadata {
    PdfMetadata::new(format!("/catalogs/{name}"), 2048, hash, Utc::now())
}

const DEPO_PAGE: &str = "DEPO AUTO PARTS\n\
    A12-1234-ABC HEAD LAMP\n\
    Made in Taiwan\n\
    OEM: 123-45678-AB\n\
    ELEC=YES MOTOR=YES PCS=4 CFT=1.25";

const YUTO_PAGE: &str = "YUTO LIGHTING\nRH LED tail light\nLED DRL\nUSA type\nPCS: 6";

#[test]
fn repeated_detection_is_served_from_cache() {
    let (backend, calls) = MockBackend::serving(&[DEPO_PAGE]);
    let detector = detector_with(backend);
    let meta = metadata("depo.pdf", "hash-1");

    let first = detector.detect_vendor(&meta, false);
    let second = detector.detect_vendor(&meta, false);

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(detector.cache_size(), 1);
}

#[test]
fn force_refresh_reruns_extraction() {
    let (backend, calls) = MockBackend::serving(&[DEPO_PAGE]);
    let detector = detector_with(backend);
    let meta = metadata("depo.pdf", "hash-1");

    detector.detect_vendor(&meta, false);
    detector.detect_vendor(&meta, true);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(detector.cache_size(), 1);
}

#[test]
fn changed_hash_is_a_new_document() {
    let (backend, calls) = MockBackend::serving(&[DEPO_PAGE]);
    let detector = detector_with(backend);

    detector.detect_vendor(&metadata("depo.pdf", "hash-1"), false);
    detector.detect_vendor(&metadata("depo.pdf", "hash-2"), false);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(detector.cache_size(), 2);
}

#[test]
fn depo_catalog_is_detected_with_full_confidence() {
    let (backend, _) = MockBackend::serving(&[DEPO_PAGE, "index page"]);
    let detector = detector_with(backend);

    let result = detector.detect_vendor(&metadata("depo.pdf", "h"), false);
    assert_eq!(result.vendor, VendorType::Depo);
    // 0.9 * 1.5 clamps to 1.0.
    assert_eq!(result.confidence(), 1.0);
    assert_eq!(result.confidence_level(), ConfidenceLevel::VeryHigh);
    assert_eq!(result.matched_signatures, vec!["signature_0"]);

    let depo_score = result.evidence.vendor_scores[&VendorType::Depo];
    assert!((depo_score - 0.9 * 1.5).abs() < 1e-9);
    assert_eq!(result.evidence.vendor_scores[&VendorType::Yuto], 0.0);
    assert_eq!(result.evidence.pages_analyzed, 2);

    let found = result.evidence.patterns_found.as_ref().unwrap();
    assert!(found.required_patterns.contains(&"A12-1234-ABC".to_string()));
    assert!(found.optional_patterns.contains(&"Made in Taiwan".to_string()));
    assert_eq!(result.page_analysis[&0].vendor_keywords["depo_keywords"], 5);
}

#[test]
fn exclusion_lowers_yuto_confidence() {
    let clean_text = YUTO_PAGE.to_string();
    let tainted_text = format!("{YUTO_PAGE}\nassembled in Taiwan");

    let (backend, _) = MockBackend::serving(&[clean_text.as_str()]);
    let clean = detector_with(backend).detect_vendor(&metadata("yuto.pdf", "a"), false);

    let (backend, _) = MockBackend::serving(&[tainted_text.as_str()]);
    let tainted = detector_with(backend).detect_vendor(&metadata("yuto.pdf", "b"), false);

    assert_eq!(clean.vendor, VendorType::Yuto);
    assert_eq!(tainted.vendor, VendorType::Yuto);

    let clean_score = clean.evidence.vendor_scores[&VendorType::Yuto];
    let tainted_score = tainted.evidence.vendor_scores[&VendorType::Yuto];
    assert!((tainted_score - clean_score * 0.7).abs() < 1e-9);
    assert_eq!(
        tainted.evidence.signature_details[0].exclusions_found,
        vec!["Taiwan"]
    );
}

#[test]
fn unmatched_text_falls_back_to_generic() {
    let (backend, _) = MockBackend::serving(&["Lorem ipsum dolor sit amet"]);
    let detector = detector_with(backend);

    let result = detector.detect_vendor(&metadata("misc.pdf", "h"), false);
    assert_eq!(result.vendor, VendorType::Generic);
    assert_eq!(result.confidence(), 0.3);
    assert!(result.matched_signatures.is_empty());
    assert!(result.evidence.error.is_none());
}

#[test]
fn invalid_metadata_skips_extraction() {
    let (backend, calls) = MockBackend::serving(&[DEPO_PAGE]);
    let detector = detector_with(backend);
    let meta = metadata("locked.pdf", "h")
        .with_failure(PdfStatus::Encrypted, "document is password protected");

    let result = detector.detect_vendor(&meta, false);
    assert_eq!(result.vendor, VendorType::Unknown);
    assert_eq!(result.confidence(), 0.0);
    assert_eq!(
        result.evidence.error.as_deref(),
        Some("invalid PDF: document is password protected")
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(detector.cache_size(), 1);
}

#[test]
fn extraction_failure_is_unknown() {
    let (backend, calls) = MockBackend::failing();
    let detector = detector_with(backend);

    let result = detector.detect_vendor(&metadata("broken.pdf", "h"), false);
    assert_eq!(result.vendor, VendorType::Unknown);
    assert_eq!(
        result.evidence.error.as_deref(),
        Some("no text could be extracted from PDF")
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn max_pages_is_forwarded_to_backend() {
    let (backend, _) = MockBackend::serving(&["p1", "p2", "p3", "DEPO A12-1234-ABC"]);
    let detector = detector_with(backend).with_max_pages(3);

    let result = detector.detect_vendor(&metadata("long.pdf", "h"), false);
    // The DEPO page is past the limit.
    assert_eq!(result.vendor, VendorType::Generic);
    assert_eq!(result.page_analysis.len(), 3);
}

#[test]
fn stats_and_clear_cache() {
    let (backend, calls) = MockBackend::serving(&[DEPO_PAGE]);
    let detector = detector_with(backend);

    detector.detect_vendor(&metadata("a.pdf", "1"), false);
    detector.detect_vendor(&metadata("b.pdf", "2"), false);
    detector.detect_vendor(
        &metadata("c.pdf", "3").with_failure(PdfStatus::Corrupted, "bad xref"),
        false,
    );

    let stats = detector.detection_stats();
    assert_eq!(stats.total_detections, 3);
    assert_eq!(stats.cache_size, 3);
    assert_eq!(stats.vendor_distribution[&VendorType::Depo], 2);
    assert_eq!(stats.vendor_distribution[&VendorType::Unknown], 1);
    assert_eq!(stats.confidence_distribution[&ConfidenceLevel::VeryHigh], 2);
    assert!((stats.average_confidence - 2.0 / 3.0).abs() < 1e-9);

    assert_eq!(detector.clear_cache(), 3);
    assert_eq!(detector.detection_stats().total_detections, 0);

    detector.detect_vendor(&metadata("a.pdf", "1"), false);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn detector_is_shared_across_threads() {
    let (backend, calls) = MockBackend::serving(&[YUTO_PAGE]);
    let detector = Arc::new(detector_with(backend));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let detector = detector.clone();
            std::thread::spawn(move || {
                detector
                    .detect_vendor(&metadata(&format!("{i}.pdf"), "h"), false)
                    .vendor
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), VendorType::Yuto);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
