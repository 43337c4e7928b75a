use std::collections::BTreeMap;
use std::fmt;

use catalogscan_core::VendorType;
use serde::Serialize;

use crate::page_analysis::PageAnalysis;

/// Five-tier banding of a detection confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    /// Lower bounds are inclusive: 0.90, 0.70, 0.50 and 0.25.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.90 {
            ConfidenceLevel::VeryHigh
        } else if confidence >= 0.70 {
            ConfidenceLevel::High
        } else if confidence >= 0.50 {
            ConfidenceLevel::Medium
        } else if confidence >= 0.25 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::VeryHigh => "very_high",
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::VeryLow => "very_low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub matched_signatures: usize,
    pub total_signatures: usize,
    /// `matched / max(1, total)`.
    pub match_ratio: f64,
}

impl AnalysisSummary {
    pub fn new(matched_signatures: usize, total_signatures: usize) -> Self {
        Self {
            matched_signatures,
            total_signatures,
            match_ratio: matched_signatures as f64 / total_signatures.max(1) as f64,
        }
    }
}

/// How one qualifying signature contributed to the winning vendor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureDetail {
    pub signature_id: usize,
    pub name: String,
    pub score: f64,
    pub required_matches: Vec<String>,
    pub optional_matches: Vec<String>,
    pub exclusions_found: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternsFound {
    /// Distinct matched strings, sorted.
    pub required_patterns: Vec<String>,
    pub optional_patterns: Vec<String>,
    /// Raw match count before deduplication.
    pub total_pattern_matches: usize,
}

impl PatternsFound {
    /// Summarize matched strings across `details`, or `None` if nothing
    /// matched at all.
    pub fn collect(details: &[SignatureDetail]) -> Option<Self> {
        let required: Vec<&String> = details.iter().flat_map(|d| &d.required_matches).collect();
        let optional: Vec<&String> = details.iter().flat_map(|d| &d.optional_matches).collect();
        if required.is_empty() && optional.is_empty() {
            return None;
        }

        let dedup = |items: &[&String]| {
            let mut out: Vec<String> = items.iter().map(|s| s.to_string()).collect();
            out.sort();
            out.dedup();
            out
        };

        Some(Self {
            required_patterns: dedup(&required),
            optional_patterns: dedup(&optional),
            total_pattern_matches: required.len() + optional.len(),
        })
    }
}

/// Why a vendor was chosen. Purely explanatory: nothing here feeds back into
/// scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evidence {
    /// Set when detection could not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub analysis_summary: AnalysisSummary,
    pub vendor_scores: BTreeMap<VendorType, f64>,
    pub signature_details: Vec<SignatureDetail>,
    pub pages_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns_found: Option<PatternsFound>,
}

impl Evidence {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Outcome of classifying one document.
///
/// The confidence level is derived from the confidence once, at
/// construction, and cannot drift from it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub vendor: VendorType,
    confidence: f64,
    confidence_level: ConfidenceLevel,
    pub matched_signatures: Vec<String>,
    pub evidence: Evidence,
    pub page_analysis: BTreeMap<usize, PageAnalysis>,
}

impl DetectionResult {
    /// `confidence` is clamped to `[0, 1]`.
    pub fn new(
        vendor: VendorType,
        confidence: f64,
        matched_signatures: Vec<String>,
        evidence: Evidence,
        page_analysis: BTreeMap<usize, PageAnalysis>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            vendor,
            confidence,
            confidence_level: ConfidenceLevel::from_confidence(confidence),
            matched_signatures,
            evidence,
            page_analysis,
        }
    }

    /// An UNKNOWN result with zero confidence carrying `error`.
    pub fn unknown(error: impl Into<String>) -> Self {
        Self::new(
            VendorType::Unknown,
            0.0,
            Vec::new(),
            Evidence::error(error),
            BTreeMap::new(),
        )
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        self.confidence_level
    }
}
