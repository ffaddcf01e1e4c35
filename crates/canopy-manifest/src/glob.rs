//! Item patterns: the `Include`, `Remove` and `Exclude` values of project
//! items.
//!
//! A pattern is split into a fixed directory prefix and a wildcard
//! remainder. The prefix is resolved against the manifest directory; the
//! remainder is matched case-insensitively below it, where `*` and `?` stay
//! within one path segment and `**` crosses segments.

use crate::error::{Error, Result};
use canopy_fs::{normalize_lexically, DiscoveryOptions, FileSystem};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A compiled item pattern.
#[derive(Debug, Clone)]
pub struct ItemPattern {
    raw: String,
    base: PathBuf,
    wildcard: Option<GlobMatcher>,
}

impl ItemPattern {
    /// Compiles `pattern` relative to `manifest_dir`. Backslashes are
    /// treated as separators.
    pub fn new(pattern: &str, manifest_dir: &Path) -> Result<Self> {
        let normalized = pattern.trim().replace('\\', "/");
        let segments: Vec<&str> = normalized.split('/').collect();
        let split = segments
            .iter()
            .position(|segment| has_wildcard(segment))
            .unwrap_or(segments.len());

        let prefix = segments[..split].join("/");
        let base = normalize_lexically(&manifest_dir.join(prefix));

        let wildcard = if split < segments.len() {
            let remainder = segments[split..].join("/");
            let glob = GlobBuilder::new(&remainder)
                .case_insensitive(true)
                .literal_separator(true)
                .backslash_escape(false)
                .build()
                .map_err(|source| Error::Glob {
                    pattern: pattern.to_string(),
                    source,
                })?;
            Some(glob.compile_matcher())
        } else {
            None
        };

        Ok(Self {
            raw: pattern.to_string(),
            base,
            wildcard,
        })
    }

    /// The pattern as written in the manifest.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The fixed directory (or, without wildcards, the exact file).
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard.is_some()
    }

    /// Whether `path` (absolute, lexically normalized) matches, ignoring case.
    pub fn matches(&self, path: &Path) -> bool {
        let candidate = comparable(path);
        let base = comparable(&self.base);
        match &self.wildcard {
            None => candidate == base,
            Some(matcher) => {
                let prefix = if base.ends_with('/') {
                    base
                } else {
                    format!("{}/", base)
                };
                match candidate.strip_prefix(&prefix) {
                    Some(relative) => matcher.is_match(relative),
                    None => false,
                }
            }
        }
    }

    /// Expands the pattern to existing files with one of `extensions`.
    pub async fn expand<F: FileSystem + ?Sized>(
        &self,
        fs: &F,
        extensions: &[&str],
        options: &DiscoveryOptions,
    ) -> std::io::Result<Vec<PathBuf>> {
        if self.wildcard.is_none() {
            let metadata = fs.metadata(&self.base).await?;
            if !metadata.is_file {
                return Ok(Vec::new());
            }
            // same size limit a wildcard scan applies
            if let Some(max) = options.max_file_size.filter(|&max| metadata.size > max) {
                warn!(
                    "Skipping {} ({} bytes exceeds the {} byte limit)",
                    self.base.display(),
                    metadata.size,
                    max
                );
                return Ok(Vec::new());
            }
            return Ok(vec![self.base.clone()]);
        }

        let candidates = fs.discover_files(&self.base, extensions, options).await?;
        Ok(candidates
            .into_iter()
            .filter(|path| self.matches(path))
            .collect())
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

/// Lowercased, forward-slash form of a path for comparisons.
pub(crate) fn comparable(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

/// Splits a `;`-separated item value into trimmed, non-empty entries.
pub fn split_item_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.replace('\\', "/"))
        .collect()
}
