//! Capability descriptors: which file and project-manifest extensions an
//! analyzer owns.

use std::collections::BTreeSet;
use std::path::Path;

/// Normalizes an extension for comparison.
///
/// Extensions are compared case-insensitively and always carry a leading
/// dot: `"CS"`, `".cs"` and `" .Cs "` all normalize to `".cs"`. An empty
/// input stays empty.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with('.') {
        lowered
    } else {
        format!(".{}", lowered)
    }
}

/// Returns the normalized extension of a path, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .filter(|ext| !ext.is_empty())
}

/// Declares the file and project extensions an analyzer owns.
///
/// A capability is immutable once constructed; all extensions are stored
/// normalized (see [`normalize_extension`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerCapability {
    name: String,
    file_extensions: BTreeSet<String>,
    project_extensions: BTreeSet<String>,
}

impl AnalyzerCapability {
    /// Creates a capability from a name and two extension lists.
    pub fn new<I, J, S, T>(name: impl Into<String>, file_extensions: I, project_extensions: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            name: name.into(),
            file_extensions: collect_normalized(file_extensions),
            project_extensions: collect_normalized(project_extensions),
        }
    }

    /// Analyzer name (e.g. "csharp").
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized source-file extensions.
    pub fn file_extensions(&self) -> &BTreeSet<String> {
        &self.file_extensions
    }

    /// Normalized project-manifest extensions.
    pub fn project_extensions(&self) -> &BTreeSet<String> {
        &self.project_extensions
    }

    /// Whether the capability includes the given source-file extension.
    pub fn supports_file_extension(&self, extension: &str) -> bool {
        self.file_extensions.contains(&normalize_extension(extension))
    }

    /// Whether the capability includes the given project-manifest extension.
    pub fn supports_project_extension(&self, extension: &str) -> bool {
        self.project_extensions
            .contains(&normalize_extension(extension))
    }

    /// Whether this capability claims the given source file.
    pub fn claims_file(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.file_extensions.contains(&ext))
    }

    /// Whether this capability claims the given project manifest.
    pub fn claims_project(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.project_extensions.contains(&ext))
    }
}

fn collect_normalized<I, S>(extensions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|ext| normalize_extension(ext.as_ref()))
        .filter(|ext| !ext.is_empty())
        .collect()
}
