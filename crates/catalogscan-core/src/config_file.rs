use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PAGES: usize = 10;
pub const DEFAULT_PAGE_ANALYSIS_PAGES: usize = 5;
pub const DEFAULT_NUM_WORKERS: usize = 4;
pub const DEFAULT_CACHE_FILE: &str = "pdf_metadata_cache.json";

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub detection: Option<DetectionConfig>,
    pub ingest: Option<IngestConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Pages of text fed to the scorer.
    pub max_pages: Option<usize>,
    /// Leading pages that get a per-page keyword/density breakdown.
    pub page_analysis_pages: Option<usize>,
    /// TOML file with vendor signatures; built-in defaults when unset.
    pub signatures_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub cache_path: Option<String>,
    pub recursive: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub num_workers: Option<usize>,
}

impl ConfigFile {
    pub fn max_pages(&self) -> usize {
        self.detection
            .as_ref()
            .and_then(|d| d.max_pages)
            .unwrap_or(DEFAULT_MAX_PAGES)
    }

    pub fn page_analysis_pages(&self) -> usize {
        self.detection
            .as_ref()
            .and_then(|d| d.page_analysis_pages)
            .unwrap_or(DEFAULT_PAGE_ANALYSIS_PAGES)
    }

    pub fn signatures_path(&self) -> Option<PathBuf> {
        self.detection
            .as_ref()
            .and_then(|d| d.signatures_path.as_ref())
            .map(PathBuf::from)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.ingest
            .as_ref()
            .and_then(|i| i.cache_path.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE))
    }

    pub fn recursive(&self) -> bool {
        self.ingest.as_ref().and_then(|i| i.recursive).unwrap_or(true)
    }

    pub fn num_workers(&self) -> usize {
        self.concurrency
            .as_ref()
            .and_then(|c| c.num_workers)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_NUM_WORKERS)
    }
}

/// Platform config directory path: `<config_dir>/catalogscan/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catalogscan").join("config.toml"))
}

/// Load config by cascading CWD `.catalogscan.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".catalogscan.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Overlay wins field by field; a section absent from both stays absent.
fn pick<S, T>(
    base: &Option<S>,
    overlay: &Option<S>,
    field: impl Fn(&S) -> Option<T>,
) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let detection = (base.detection.is_some() || overlay.detection.is_some()).then(|| {
        DetectionConfig {
            max_pages: pick(&base.detection, &overlay.detection, |d| d.max_pages),
            page_analysis_pages: pick(&base.detection, &overlay.detection, |d| {
                d.page_analysis_pages
            }),
            signatures_path: pick(&base.detection, &overlay.detection, |d| {
                d.signatures_path.clone()
            }),
        }
    });
    let ingest = (base.ingest.is_some() || overlay.ingest.is_some()).then(|| IngestConfig {
        cache_path: pick(&base.ingest, &overlay.ingest, |i| i.cache_path.clone()),
        recursive: pick(&base.ingest, &overlay.ingest, |i| i.recursive),
    });
    let concurrency = (base.concurrency.is_some() || overlay.concurrency.is_some()).then(|| {
        ConcurrencyConfig {
            num_workers: pick(&base.concurrency, &overlay.concurrency, |c| c.num_workers),
        }
    });

    ConfigFile {
        detection,
        ingest,
        concurrency,
    }
}
