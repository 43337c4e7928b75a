//! JSON-backed metadata cache keyed by file path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;

use catalogscan_core::PdfMetadata;

use crate::IngestError;

/// Modification times closer than this are treated as unchanged.
const MTIME_TOLERANCE_MS: i64 = 1000;

#[derive(Debug)]
pub struct MetadataCache {
    path: PathBuf,
    entries: DashMap<String, PdfMetadata>,
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl MetadataCache {
    /// An empty cache that will be written to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: DashMap::new(),
        }
    }

    /// Load the cache document at `path`. A missing file yields an empty
    /// cache; an unreadable or malformed one is logged and ignored.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let cache = Self::empty(path);
        let text = match std::fs::read_to_string(&cache.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %cache.path.display(), "no metadata cache yet");
                return cache;
            }
            Err(e) => {
                tracing::warn!(path = %cache.path.display(), error = %e, "could not read metadata cache");
                return cache;
            }
        };

        match serde_json::from_str::<BTreeMap<String, PdfMetadata>>(&text) {
            Ok(entries) => {
                for (key, metadata) in entries {
                    cache.entries.insert(key, metadata);
                }
                tracing::debug!(
                    path = %cache.path.display(),
                    entries = cache.entries.len(),
                    "metadata cache loaded"
                );
            }
            Err(e) => {
                tracing::warn!(path = %cache.path.display(), error = %e, "ignoring corrupt metadata cache");
            }
        }
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cached record for `file`, if its size still matches and its
    /// modification time moved by less than a second.
    pub fn get_fresh(&self, file: &Path, size: u64, mtime: DateTime<Utc>) -> Option<PdfMetadata> {
        let entry = self.entries.get(&cache_key(file))?;
        let drift = (mtime - entry.modified_time).num_milliseconds().abs();
        (entry.file_size == size && drift < MTIME_TOLERANCE_MS).then(|| entry.value().clone())
    }

    /// Store a record. Only valid records are kept.
    pub fn insert(&self, metadata: &PdfMetadata) -> bool {
        if !metadata.is_valid() {
            return false;
        }
        self.entries
            .insert(cache_key(&metadata.file_path), metadata.clone());
        true
    }

    /// Drop every entry, or only those whose path matches the shell-style
    /// `pattern`. Returns the number removed.
    pub fn remove_matching(&self, pattern: Option<&str>) -> Result<usize, IngestError> {
        let Some(pattern) = pattern else {
            let count = self.entries.len();
            self.entries.clear();
            return Ok(count);
        };

        let re = glob_to_regex(pattern)?;
        let before = self.entries.len();
        self.entries.retain(|key, _| !re.is_match(key));
        Ok(before - self.entries.len())
    }

    /// Write the cache document, creating parent directories as needed.
    pub fn save(&self) -> Result<(), IngestError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot: BTreeMap<String, PdfMetadata> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), entries = snapshot.len(), "metadata cache saved");
        Ok(())
    }
}

/// Translate a shell-style pattern (`*`, `?`, `[...]`, `[!...]`) into an
/// anchored regex. `*` crosses path separators.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, IngestError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut j = i + 1;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str(r"\[");
                } else {
                    let mut class: String = chars[i + 1..j].iter().collect();
                    if let Some(rest) = class.strip_prefix('!') {
                        class = format!("^{rest}");
                    }
                    out.push('[');
                    out.push_str(&class.replace('\\', r"\\").replace('[', r"\["));
                    out.push(']');
                    i = j;
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    Ok(Regex::new(&out)?)
}
