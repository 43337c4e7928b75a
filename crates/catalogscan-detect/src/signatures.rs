//! Vendor detection signatures and where they come from.
//!
//! A [`SignatureStore`] maps each [`VendorType`] to its weighted
//! [`DetectionSignature`]s. Stores are built once from a
//! [`SignatureSource`] and never mutated; reloading means building a new
//! store. Whenever a source fails or yields nothing usable, the built-in
//! defaults from [`SignatureStore::defaults`] are used instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use catalogscan_core::VendorType;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read signature file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse signature file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("unknown vendor in signature config: {0}")]
    UnknownVendor(String),
    #[error("signature weight must be positive, got {0}")]
    InvalidWeight(f64),
}

fn default_weight() -> f64 {
    1.0
}

/// One signature as written in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub required_patterns: Vec<String>,
    #[serde(default)]
    pub optional_patterns: Vec<String>,
    #[serde(default)]
    pub exclusion_patterns: Vec<String>,
    /// Metadata field name to patterns. Carried through for callers but not
    /// used in scoring.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata_patterns: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Default for SignatureSpec {
    fn default() -> Self {
        Self {
            name: None,
            required_patterns: Vec::new(),
            optional_patterns: Vec::new(),
            exclusion_patterns: Vec::new(),
            metadata_patterns: BTreeMap::new(),
            weight: default_weight(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorSignatures {
    #[serde(default)]
    pub signatures: Vec<SignatureSpec>,
}

/// Raw signature configuration: vendor name to signature list.
///
/// ```toml
/// [[vendors.depo.signatures]]
/// name = "depo-core"
/// required_patterns = ['DEPO']
/// weight = 1.5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureConfig {
    #[serde(default)]
    pub vendors: BTreeMap<String, VendorSignatures>,
}

/// Anything that can produce a [`SignatureConfig`].
pub trait SignatureSource {
    /// Human-readable origin for log lines.
    fn describe(&self) -> String;

    fn load(&self) -> Result<SignatureConfig, ConfigError>;
}

/// Signatures read from a TOML file.
#[derive(Debug, Clone)]
pub struct TomlSignatureSource {
    path: PathBuf,
}

impl TomlSignatureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SignatureSource for TomlSignatureSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<SignatureConfig, ConfigError> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Signatures held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSignatureSource(pub SignatureConfig);

impl SignatureSource for StaticSignatureSource {
    fn describe(&self) -> String {
        "in-memory".to_string()
    }

    fn load(&self) -> Result<SignatureConfig, ConfigError> {
        Ok(self.0.clone())
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .map_err(|source| ConfigError::Pattern {
                    pattern: p.clone(),
                    source,
                })
        })
        .collect()
}

/// Patterns matched by one signature against a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureMatch {
    /// Final contribution: base plus optional bonus, after exclusion penalty
    /// and weight.
    pub score: f64,
    pub required_matches: Vec<String>,
    pub optional_matches: Vec<String>,
    pub exclusions_found: Vec<String>,
}

/// Score for satisfying every required pattern.
pub const REQUIRED_BASE_SCORE: f64 = 0.6;
/// Maximum bonus, earned when every optional pattern matches.
pub const OPTIONAL_BONUS: f64 = 0.3;
/// Multiplicative penalty per matched exclusion pattern.
pub const EXCLUSION_PENALTY: f64 = 0.3;
/// The exclusion multiplier never drops below this.
pub const EXCLUSION_FLOOR: f64 = 0.1;

/// A compiled, weighted matching rule for one vendor.
///
/// Patterns are compiled case-insensitive and multi-line.
#[derive(Debug, Clone)]
pub struct DetectionSignature {
    pub name: Option<String>,
    required: Vec<Regex>,
    optional: Vec<Regex>,
    exclusion: Vec<Regex>,
    pub metadata_patterns: BTreeMap<String, Vec<String>>,
    pub weight: f64,
}

impl DetectionSignature {
    pub fn compile(spec: &SignatureSpec) -> Result<Self, ConfigError> {
        if !(spec.weight > 0.0 && spec.weight.is_finite()) {
            return Err(ConfigError::InvalidWeight(spec.weight));
        }
        Ok(Self {
            name: spec.name.clone(),
            required: compile_all(&spec.required_patterns)?,
            optional: compile_all(&spec.optional_patterns)?,
            exclusion: compile_all(&spec.exclusion_patterns)?,
            metadata_patterns: spec.metadata_patterns.clone(),
            weight: spec.weight,
        })
    }

    pub fn required_patterns(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(Regex::as_str)
    }

    pub fn optional_patterns(&self) -> impl Iterator<Item = &str> {
        self.optional.iter().map(Regex::as_str)
    }

    pub fn exclusion_patterns(&self) -> impl Iterator<Item = &str> {
        self.exclusion.iter().map(Regex::as_str)
    }

    /// Score this signature against `text`.
    ///
    /// Returns `None` unless every required pattern matches. A signature with
    /// no required patterns always qualifies.
    pub fn evaluate(&self, text: &str) -> Option<SignatureMatch> {
        let mut result = SignatureMatch::default();

        for re in &self.required {
            let found = collect_matches(re, text);
            if found.is_empty() {
                return None;
            }
            result.required_matches.extend(found);
        }

        let mut score = REQUIRED_BASE_SCORE;

        let mut optional_hits = 0usize;
        for re in &self.optional {
            let found = collect_matches(re, text);
            if !found.is_empty() {
                optional_hits += 1;
                result.optional_matches.extend(found);
            }
        }
        if !self.optional.is_empty() {
            score += OPTIONAL_BONUS * optional_hits as f64 / self.optional.len() as f64;
        }

        let mut exclusion_hits = 0usize;
        for re in &self.exclusion {
            let found = collect_matches(re, text);
            if !found.is_empty() {
                exclusion_hits += 1;
                result.exclusions_found.extend(found);
            }
        }
        if exclusion_hits > 0 {
            score *= (1.0 - EXCLUSION_PENALTY * exclusion_hits as f64).max(EXCLUSION_FLOOR);
        }

        result.score = score * self.weight;
        Some(result)
    }
}

fn collect_matches(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Immutable vendor to signatures mapping.
#[derive(Debug, Clone)]
pub struct SignatureStore {
    signatures: BTreeMap<VendorType, Vec<DetectionSignature>>,
}

impl SignatureStore {
    /// Build a store from `source`, falling back to [`defaults`](Self::defaults)
    /// when the source fails or contains no usable signature.
    pub fn load(source: &dyn SignatureSource) -> Self {
        match source.load() {
            Ok(config) => {
                let store = Self::from_config(&config);
                if store.signature_count() > 0 {
                    return store;
                }
                tracing::info!(source = %source.describe(), "no usable signatures, using defaults");
            }
            Err(e) => {
                tracing::error!(source = %source.describe(), error = %e, "failed to load signatures");
            }
        }
        Self::defaults()
    }

    /// Shorthand for loading a TOML signature file.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::load(&TomlSignatureSource::new(path.as_ref()))
    }

    /// Build a store from an already-parsed config. Unknown vendors and
    /// signatures that fail to compile are skipped with a warning. No
    /// fallback is applied.
    pub fn from_config(config: &SignatureConfig) -> Self {
        let mut signatures = BTreeMap::new();

        for (vendor_name, vendor_config) in &config.vendors {
            let vendor: VendorType = match vendor_name.parse() {
                Ok(v) => v,
                Err(_) => {
                    let e = ConfigError::UnknownVendor(vendor_name.clone());
                    tracing::warn!(error = %e, "skipping vendor");
                    continue;
                }
            };

            let compiled: Vec<DetectionSignature> = vendor_config
                .signatures
                .iter()
                .enumerate()
                .filter_map(|(i, spec)| match DetectionSignature::compile(spec) {
                    Ok(sig) => Some(sig),
                    Err(e) => {
                        tracing::warn!(vendor = %vendor, index = i, error = %e, "skipping signature");
                        None
                    }
                })
                .collect();

            tracing::debug!(vendor = %vendor, count = compiled.len(), "loaded signatures");
            signatures.insert(vendor, compiled);
        }

        Self { signatures }
    }

    /// The built-in signatures for DEPO, YUTO, HUSHAN and the GENERIC
    /// catch-all.
    pub fn defaults() -> Self {
        tracing::info!("loading default vendor signatures");
        Self::from_config(&default_signature_config())
    }

    /// Signatures for `vendor`; empty for vendors with none.
    pub fn get(&self, vendor: VendorType) -> &[DetectionSignature] {
        self.signatures.get(&vendor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All vendors in declaration order.
    pub fn get_all(&self) -> &BTreeMap<VendorType, Vec<DetectionSignature>> {
        &self.signatures
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.values().map(Vec::len).sum()
    }
}

impl Default for SignatureStore {
    fn default() -> Self {
        Self::defaults()
    }
}

fn spec(required: &[&str], optional: &[&str], exclusion: &[&str], weight: f64) -> SignatureSpec {
    let owned = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
    SignatureSpec {
        required_patterns: owned(required),
        optional_patterns: owned(optional),
        exclusion_patterns: owned(exclusion),
        weight,
        ..Default::default()
    }
}

/// Built-in signature config, also useful as a template for custom files.
pub fn default_signature_config() -> SignatureConfig {
    let depo = spec(
        &["DEPO", r"[A-J]\d{2}[-\s]\d{4}[-\s][A-Z]{2,3}\d*"],
        &[
            "Taiwan",
            r"Made\s+in\s+Taiwan",
            r"OEM\s*:?\s*\d{3}[-\s]\d{5}[-\s][A-Z]{2}\d*",
            r"ELEC\s*=\s*YES",
            r"MOTOR\s*=\s*YES",
            r"PCS\s*=\s*\d+",
            r"CFT\s*=\s*\d+\.?\d*",
        ],
        &["YUTO", "HUSHAN", r"Made\s+in\s+China"],
        1.5,
    );

    let yuto = spec(
        &["YUTO", r"[LR]HD?\s+(?:LED|LAMP|LIGHT)"],
        &[
            "China",
            r"Made\s+in\s+China",
            r"LED\s+(?:DRL|Puddle|Heat)",
            r"USA\s+type",
            r"Non[-\s]US",
            r"PCS\s*:?\s*\d+",
            r"CFT\s*:?\s*\d+\.?\d*",
            r"N\.W\.\s*:?\s*\d+\.?\d*\s*KG",
            r"G\.W\.\s*:?\s*\d+\.?\d*\s*KG",
        ],
        &["DEPO", "HUSHAN", "Taiwan"],
        1.3,
    );

    let hushan = spec(
        &["HUSHAN", r"(?:Black|Chrome|Clear)\s+(?:Housing|Finish|Style)"],
        &[
            "China",
            r"with\s+keyhole",
            r"smart\s+key\s+sensor",
            "heated",
            r"mirror\s+glass",
            r"turn\s+signal",
            r"PCS\s*=\s*\d+",
            r"N\.W\.\s*=\s*\d+\.?\d*\s*KG",
        ],
        &["DEPO", "YUTO", "Taiwan"],
        1.2,
    );

    let generic = spec(
        &[
            r"(?:OEM|OE)\s*:?\s*[A-Z0-9\-]+",
            r"(?:Part|Model)\s*:?\s*[A-Z0-9\-]+",
        ],
        &[
            "Automotive",
            r"Auto\s+Parts",
            r"Compatible\s+with",
            r"Fits\s+\d{4}[-\s]\d{4}",
            r"Year\s*:?\s*\d{4}",
        ],
        &[],
        0.5,
    );

    let vendors = [
        (VendorType::Depo, depo),
        (VendorType::Yuto, yuto),
        (VendorType::Hushan, hushan),
        (VendorType::Generic, generic),
    ]
    .into_iter()
    .map(|(vendor, s)| {
        (
            vendor.to_string(),
            VendorSignatures {
                signatures: vec![s],
            },
        )
    })
    .collect();

    SignatureConfig { vendors }
}
