use canopy_core::normalize::{DEFAULT_MAX_SOURCE_TEXT_LENGTH, DEFAULT_PARALLEL_CHILD_THRESHOLD};
use canopy_core::NormalizeOptions;
use canopy_fs::DiscoveryOptions;
use serde::{Deserialize, Serialize};

/// Contents of `canopy.toml`. Every section and field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CanopyConfig {
    pub processing: ProcessingSettings,
    pub discovery: DiscoverySettings,
    pub output: OutputSettings,
}

/// `[processing]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingSettings {
    /// Files parsed at once. Unset means `min(2 × cores, 16)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Nodes with more children than this are normalized in parallel
    #[serde(default = "default_parallel_child_threshold")]
    pub parallel_child_threshold: usize,

    /// Characters of source text kept per node; 0 keeps everything
    #[serde(default = "default_max_source_text_length")]
    pub max_source_text_length: usize,

    /// Report files with syntax errors as parse failures
    #[serde(default)]
    pub reject_syntax_errors: bool,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            parallel_child_threshold: default_parallel_child_threshold(),
            max_source_text_length: default_max_source_text_length(),
            reject_syntax_errors: false,
        }
    }
}

/// `[discovery]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySettings {
    /// Directory names skipped in addition to bin, obj, packages and friends
    #[serde(default)]
    pub extra_excluded_dirs: Vec<String>,

    /// Larger files are left out of directory scans
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default)]
    pub follow_symlinks: bool,

    /// Off by default: the manifest decides what belongs to a project
    #[serde(default)]
    pub respect_gitignore: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            extra_excluded_dirs: Vec::new(),
            max_file_size: default_max_file_size(),
            follow_symlinks: false,
            respect_gitignore: false,
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSettings {
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            pretty: default_true(),
        }
    }
}

impl CanopyConfig {
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            parallel_child_threshold: self.processing.parallel_child_threshold,
            max_source_text_length: self.processing.max_source_text_length,
        }
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            max_file_size: Some(self.discovery.max_file_size),
            follow_symlinks: self.discovery.follow_symlinks,
            respect_gitignore: self.discovery.respect_gitignore,
            ..DiscoveryOptions::default()
        }
        .with_excluded_dirs(self.discovery.extra_excluded_dirs.iter().cloned())
    }
}

fn default_parallel_child_threshold() -> usize {
    DEFAULT_PARALLEL_CHILD_THRESHOLD
}

fn default_max_source_text_length() -> usize {
    DEFAULT_MAX_SOURCE_TEXT_LENGTH
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config: CanopyConfig = toml::from_str("").unwrap();
        assert_eq!(config, CanopyConfig::default());
        assert_eq!(config.processing.parallel_child_threshold, 50);
        assert_eq!(config.processing.max_source_text_length, 4096);
        assert!(config.output.pretty);
        assert_eq!(config.normalize_options(), NormalizeOptions::default());
    }

    #[test]
    fn test_partial_sections() {
        let config: CanopyConfig = toml::from_str(
            r#"
            [processing]
            max_concurrency = 3

            [discovery]
            extra_excluded_dirs = ["generated", "TestResults"]
            "#,
        )
        .unwrap();

        assert_eq!(config.processing.max_concurrency, Some(3));
        assert_eq!(config.processing.parallel_child_threshold, 50);
        let discovery = config.discovery_options();
        assert!(discovery.is_excluded_dir("testresults"));
        assert_eq!(discovery.max_file_size, Some(10 * 1024 * 1024));
        assert!(!discovery.respect_gitignore);
    }
}
