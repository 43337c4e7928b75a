//! Per-page keyword counts and pattern densities.
//!
//! This is diagnostic output attached to a [`DetectionResult`](crate::DetectionResult);
//! it does not influence which vendor wins.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageAnalysis {
    /// Length in characters.
    pub text_length: usize,
    /// Category (e.g. `depo_keywords`) to occurrence count.
    pub vendor_keywords: BTreeMap<String, usize>,
    /// Pattern family to matches per 1000 characters, plus `overall`.
    pub pattern_density: BTreeMap<String, f64>,
}

const KEYWORD_CATEGORIES: &[(&str, &[&str])] = &[
    ("depo_keywords", &["DEPO", "Taiwan", "ELEC", "MOTOR", "OEM"]),
    ("yuto_keywords", &["YUTO", "China", "LED", "RHD", "LHD", "USA type"]),
    ("hushan_keywords", &["HUSHAN", "keyhole", "sensor", "heated", "chrome"]),
    ("generic_keywords", &["Part", "Model", "Compatible", "Fits", "Year"]),
];

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap()
}

static KEYWORD_PATTERNS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    KEYWORD_CATEGORIES
        .iter()
        .map(|(category, words)| {
            let res = words
                .iter()
                .map(|w| case_insensitive(&regex::escape(w)))
                .collect();
            (*category, res)
        })
        .collect()
});

static DENSITY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("part_codes", r"[A-Z]\d{2}[-\s]\d{4}[-\s][A-Z]{2,3}\d*"),
        ("oem_codes", r"(?:OEM|OE)\s*:?\s*[A-Z0-9\-]+"),
        ("measurements", r"\d+\.?\d*\s*(?:MM|CM|INCH|KG|LBS)"),
        ("years", r"(?:19|20)\d{2}[-\s](?:19|20)\d{2}"),
        ("features", r"(?:LED|DRL|heated|sensor|keyhole)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, case_insensitive(pattern)))
    .collect()
});

/// Count case-insensitive occurrences of each category's keywords.
pub fn count_vendor_keywords(text: &str) -> BTreeMap<String, usize> {
    KEYWORD_PATTERNS
        .iter()
        .map(|(category, res)| {
            let count = res.iter().map(|re| re.find_iter(text).count()).sum();
            (category.to_string(), count)
        })
        .collect()
}

/// Matches per 1000 characters for each pattern family, and their mean as
/// `overall`. Empty text reports only `overall = 0.0`.
pub fn pattern_density(text: &str) -> BTreeMap<String, f64> {
    let mut densities = BTreeMap::new();
    let length = text.chars().count();
    if length == 0 {
        densities.insert("overall".to_string(), 0.0);
        return densities;
    }

    let per_thousand = length as f64 / 1000.0;
    for (name, re) in DENSITY_PATTERNS.iter() {
        let matches = re.find_iter(text).count() as f64;
        densities.insert(name.to_string(), matches / per_thousand);
    }
    let overall = densities.values().sum::<f64>() / densities.len() as f64;
    densities.insert("overall".to_string(), overall);
    densities
}

pub fn analyze_page(text: &str) -> PageAnalysis {
    PageAnalysis {
        text_length: text.chars().count(),
        vendor_keywords: count_vendor_keywords(text),
        pattern_density: pattern_density(text),
    }
}

/// Analyze the first `limit` pages by index. Missing indexes count as empty
/// pages.
pub fn analyze_pages(
    pages: &BTreeMap<usize, String>,
    limit: usize,
) -> BTreeMap<usize, PageAnalysis> {
    (0..limit.min(pages.len()))
        .map(|i| {
            let text = pages.get(&i).map(String::as_str).unwrap_or("");
            (i, analyze_page(text))
        })
        .collect()
}
