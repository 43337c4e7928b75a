use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use catalogscan_core::config_file::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_ANALYSIS_PAGES};
use catalogscan_core::{PdfMetadata, VendorType};
use dashmap::DashMap;
use serde::Serialize;

use crate::extractor::{PageTexts, TextExtractor};
use crate::page_analysis::analyze_pages;
use crate::result::{
    AnalysisSummary, ConfidenceLevel, DetectionResult, Evidence, PatternsFound, SignatureDetail,
};
use crate::signatures::{DetectionSignature, SignatureStore};

/// Confidence reported when no vendor-specific signature qualifies.
pub const GENERIC_FALLBACK_CONFIDENCE: f64 = 0.3;

/// Cache key: document path plus content hash, so an edited file is
/// re-detected even at the same path.
type CacheKey = (PathBuf, String);

#[derive(Debug, Default)]
struct VendorAnalysis {
    score: f64,
    matched_signatures: Vec<String>,
    details: Vec<SignatureDetail>,
    total_signatures: usize,
}

/// Score every signature of one vendor against the document text. Scores of
/// qualifying signatures add up with no cap.
fn analyze_vendor(signatures: &[DetectionSignature], text: &str) -> VendorAnalysis {
    let mut analysis = VendorAnalysis {
        total_signatures: signatures.len(),
        ..Default::default()
    };

    for (i, signature) in signatures.iter().enumerate() {
        let Some(m) = signature.evaluate(text) else {
            continue;
        };
        if m.score <= 0.0 {
            continue;
        }
        let name = signature
            .name
            .clone()
            .unwrap_or_else(|| format!("signature_{i}"));
        analysis.score += m.score;
        analysis.matched_signatures.push(name.clone());
        analysis.details.push(SignatureDetail {
            signature_id: i,
            name,
            score: m.score,
            required_matches: m.required_matches,
            optional_matches: m.optional_matches,
            exclusions_found: m.exclusions_found,
        });
    }

    analysis
}

/// Aggregate view over cached detections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionStats {
    pub total_detections: usize,
    pub vendor_distribution: BTreeMap<VendorType, usize>,
    pub confidence_distribution: BTreeMap<ConfidenceLevel, usize>,
    pub average_confidence: f64,
    pub cache_size: usize,
}

/// Classifies PDF catalogs by vendor.
///
/// Results are cached per `(path, file_hash)` until [`clear_cache`] or a
/// forced refresh, so repeated calls for the same document don't touch the
/// PDF again. Safe to share between threads.
///
/// [`clear_cache`]: VendorDetector::clear_cache
pub struct VendorDetector {
    store: Arc<SignatureStore>,
    extractor: TextExtractor,
    max_pages: usize,
    page_analysis_pages: usize,
    cache: DashMap<CacheKey, DetectionResult>,
}

impl VendorDetector {
    pub fn new(store: Arc<SignatureStore>, extractor: TextExtractor) -> Self {
        Self {
            store,
            extractor,
            max_pages: DEFAULT_MAX_PAGES,
            page_analysis_pages: DEFAULT_PAGE_ANALYSIS_PAGES,
            cache: DashMap::new(),
        }
    }

    /// Number of leading pages fed to the scorer.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Number of leading pages that get a [`PageAnalysis`](crate::PageAnalysis).
    pub fn with_page_analysis_pages(mut self, pages: usize) -> Self {
        self.page_analysis_pages = pages;
        self
    }

    pub fn signatures(&self) -> &SignatureStore {
        &self.store
    }

    pub fn extractor(&self) -> &TextExtractor {
        &self.extractor
    }

    /// Detect the vendor of an ingested document.
    ///
    /// Never fails: invalid documents and unreadable text produce an UNKNOWN
    /// result with `evidence.error` set. Those results are cached as well.
    pub fn detect_vendor(&self, metadata: &PdfMetadata, force_refresh: bool) -> DetectionResult {
        let key = (metadata.file_path.clone(), metadata.file_hash.clone());
        let file = metadata.file_name();

        if !force_refresh {
            if let Some(hit) = self.cache.get(&key) {
                tracing::debug!(file = %file, "using cached detection");
                return hit.clone();
            }
        }

        let result = if metadata.is_valid() {
            tracing::info!(file = %file, "detecting vendor");
            let start = Instant::now();
            let pages = self
                .extractor
                .extract_pages(&metadata.file_path, Some(self.max_pages));
            let result = self.classify_pages(&pages);
            tracing::info!(
                file = %file,
                vendor = %result.vendor,
                confidence = result.confidence(),
                level = %result.confidence_level(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "vendor detected"
            );
            result
        } else {
            let reason = metadata
                .error_message
                .clone()
                .unwrap_or_else(|| metadata.status.to_string());
            tracing::debug!(file = %file, status = %metadata.status, "skipping invalid PDF");
            DetectionResult::unknown(format!("invalid PDF: {reason}"))
        };

        self.cache.insert(key, result.clone());
        result
    }

    /// Classify already-extracted page texts. No caching.
    pub fn classify_pages(&self, pages: &PageTexts) -> DetectionResult {
        if pages.is_empty() {
            return DetectionResult::unknown("no text could be extracted from PDF");
        }

        let full_text = pages.values().map(String::as_str).collect::<Vec<_>>().join("\n");
        self.classify_text(&full_text, pages)
    }

    fn classify_text(&self, full_text: &str, pages: &PageTexts) -> DetectionResult {
        let mut scores: BTreeMap<VendorType, f64> = BTreeMap::new();
        let mut analyses: BTreeMap<VendorType, VendorAnalysis> = BTreeMap::new();

        for (&vendor, signatures) in self.store.get_all() {
            if vendor == VendorType::Unknown {
                continue;
            }
            let analysis = analyze_vendor(signatures, full_text);
            tracing::trace!(vendor = %vendor, score = analysis.score, "vendor scored");
            scores.insert(vendor, analysis.score);
            analyses.insert(vendor, analysis);
        }

        // Strictly greater wins, so ties go to the earlier vendor.
        let best = scores
            .iter()
            .fold(None::<(VendorType, f64)>, |best, (&vendor, &score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((vendor, score)),
            });

        let (vendor, confidence) = match best {
            Some((vendor, score)) if score > 0.0 => (vendor, score.min(1.0)),
            _ => (VendorType::Generic, GENERIC_FALLBACK_CONFIDENCE),
        };

        // Page analysis belongs to the chosen vendor's analysis; a fallback to
        // a GENERIC vendor with no signatures has none.
        let (analysis, page_analysis) = match analyses.remove(&vendor) {
            Some(a) => (a, analyze_pages(pages, self.page_analysis_pages)),
            None => (VendorAnalysis::default(), BTreeMap::new()),
        };

        let evidence = Evidence {
            error: None,
            analysis_summary: AnalysisSummary::new(
                analysis.matched_signatures.len(),
                analysis.total_signatures,
            ),
            vendor_scores: scores,
            patterns_found: PatternsFound::collect(&analysis.details),
            signature_details: analysis.details,
            pages_analyzed: page_analysis.len(),
        };

        DetectionResult::new(
            vendor,
            confidence,
            analysis.matched_signatures,
            evidence,
            page_analysis,
        )
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached detection, returning how many there were.
    pub fn clear_cache(&self) -> usize {
        let cleared = self.cache.len();
        self.cache.clear();
        tracing::info!(entries = cleared, "detection cache cleared");
        cleared
    }

    pub fn detection_stats(&self) -> DetectionStats {
        let mut stats = DetectionStats::default();
        let mut confidence_sum = 0.0;

        for entry in self.cache.iter() {
            let result = entry.value();
            *stats.vendor_distribution.entry(result.vendor).or_default() += 1;
            *stats
                .confidence_distribution
                .entry(result.confidence_level())
                .or_default() += 1;
            confidence_sum += result.confidence();
            stats.total_detections += 1;
        }

        stats.cache_size = stats.total_detections;
        if stats.total_detections > 0 {
            stats.average_confidence = confidence_sum / stats.total_detections as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::{SignatureConfig, SignatureSpec, VendorSignatures};

    fn store(entries: Vec<(&str, Vec<SignatureSpec>)>) -> Arc<SignatureStore> {
        let vendors = entries
            .into_iter()
            .map(|(name, signatures)| (name.to_string(), VendorSignatures { signatures }))
            .collect();
        Arc::new(SignatureStore::from_config(&SignatureConfig { vendors }))
    }

    fn sig(required: &[&str], weight: f64) -> SignatureSpec {
        SignatureSpec {
            required_patterns: required.iter().map(|s| s.to_string()).collect(),
            weight,
            ..Default::default()
        }
    }

    fn pages(texts: &[&str]) -> PageTexts {
        texts.iter().map(|t| t.to_string()).enumerate().collect()
    }

    fn detector(store: Arc<SignatureStore>) -> VendorDetector {
        VendorDetector::new(store, TextExtractor::default())
    }

    #[test]
    fn additive_scores_are_clamped_to_one() {
        let d = detector(store(vec![(
            "depo",
            vec![sig(&["DEPO"], 1.0), sig(&["Taiwan"], 1.0)],
        )]));
        let result = d.classify_pages(&pages(&["DEPO lamps, Made in Taiwan"]));
        assert_eq!(result.vendor, VendorType::Depo);
        assert_eq!(result.confidence(), 1.0);
        assert!((result.evidence.vendor_scores[&VendorType::Depo] - 1.2).abs() < 1e-9);
        assert_eq!(result.matched_signatures, vec!["signature_0", "signature_1"]);
        assert_eq!(result.evidence.analysis_summary.match_ratio, 1.0);
    }

    #[test]
    fn ties_go_to_declaration_order() {
        let d = detector(store(vec![
            ("hushan", vec![sig(&["lamp"], 1.0)]),
            ("yuto", vec![sig(&["lamp"], 1.0)]),
        ]));
        let result = d.classify_pages(&pages(&["tail lamp"]));
        assert_eq!(result.vendor, VendorType::Yuto);
    }

    #[test]
    fn named_signatures_are_reported_by_name() {
        let mut named = sig(&["YUTO"], 1.0);
        named.name = Some("yuto-led".into());
        let d = detector(store(vec![("yuto", vec![named])]));
        let result = d.classify_pages(&pages(&["YUTO"]));
        assert_eq!(result.matched_signatures, vec!["yuto-led"]);
        assert_eq!(result.evidence.signature_details[0].name, "yuto-led");
    }

    #[test]
    fn zero_scores_fall_back_to_generic() {
        let d = detector(store(vec![
            ("depo", vec![sig(&["DEPO"], 1.5)]),
            ("generic", vec![sig(&["OEM"], 0.5)]),
        ]));
        let result = d.classify_pages(&pages(&["nothing relevant here"]));
        assert_eq!(result.vendor, VendorType::Generic);
        assert_eq!(result.confidence(), 0.3);
        assert_eq!(result.confidence_level(), ConfidenceLevel::Low);
        assert_eq!(result.evidence.analysis_summary.total_signatures, 1);
        assert_eq!(result.evidence.pages_analyzed, 1);
        assert!(result.evidence.patterns_found.is_none());
    }

    #[test]
    fn generic_fallback_without_generic_signatures() {
        let d = detector(store(vec![("depo", vec![sig(&["DEPO"], 1.5)])]));
        let result = d.classify_pages(&pages(&["plain text"]));
        assert_eq!(result.vendor, VendorType::Generic);
        assert_eq!(result.confidence(), 0.3);
        assert!(result.page_analysis.is_empty());
    }

    #[test]
    fn unknown_vendor_is_never_scored() {
        let d = detector(store(vec![("unknown", vec![sig(&["text"], 5.0)])]));
        let result = d.classify_pages(&pages(&["some text"]));
        assert_eq!(result.vendor, VendorType::Generic);
        assert!(!result.evidence.vendor_scores.contains_key(&VendorType::Unknown));
    }

    #[test]
    fn empty_pages_are_unknown() {
        let d = detector(Arc::new(SignatureStore::defaults()));
        let result = d.classify_pages(&PageTexts::new());
        assert_eq!(result.vendor, VendorType::Unknown);
        assert_eq!(result.confidence(), 0.0);
        assert_eq!(
            result.evidence.error.as_deref(),
            Some("no text could be extracted from PDF")
        );
    }

    #[test]
    fn page_analysis_limited_to_configured_pages() {
        let d = detector(Arc::new(SignatureStore::defaults())).with_page_analysis_pages(2);
        let result = d.classify_pages(&pages(&["a", "b", "c"]));
        assert_eq!(result.page_analysis.len(), 2);
        assert_eq!(result.evidence.pages_analyzed, 2);
    }
}
