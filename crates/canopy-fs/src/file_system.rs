//! FileSystem trait for source-tree access.

use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};

/// File metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    /// Whether the path exists.
    pub exists: bool,
    /// Whether the path is a file (false if directory or doesn't exist).
    pub is_file: bool,
    /// Whether the path is a directory.
    pub is_dir: bool,
    /// Whether the path is a symbolic link.
    pub is_symlink: bool,
    /// File size in bytes (0 for directories or non-existent files).
    pub size: u64,
}

impl FileMetadata {
    /// Metadata for a path that does not exist.
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Options for file discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Maximum file size to include (bytes).
    pub max_file_size: Option<u64>,

    /// Follow symbolic links (default: false).
    pub follow_symlinks: bool,

    /// Maximum directory depth (default: 100).
    pub max_depth: usize,

    /// Include hidden files (default: false).
    pub include_hidden: bool,

    /// Respect .gitignore files (default: false).
    pub respect_gitignore: bool,

    /// Directory names skipped anywhere below the discovery root, compared
    /// case-insensitively.
    pub excluded_dirs: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_file_size: Some(10 * 1024 * 1024), // 10MB default
            follow_symlinks: false,
            max_depth: 100,
            include_hidden: false,
            respect_gitignore: false,
            excluded_dirs: Vec::new(),
        }
    }
}

impl DiscoveryOptions {
    /// Adds directory names to the exclusion list.
    pub fn with_excluded_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Whether a directory name is excluded.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(name))
    }

    /// Whether any directory component of `relative` (a path relative to the
    /// discovery root, file name excluded) is excluded or hidden.
    pub(crate) fn skips_relative(&self, relative: &Path) -> bool {
        let Some(parent) = relative.parent() else {
            return false;
        };
        parent.components().any(|component| match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                self.is_excluded_dir(&name) || (!self.include_hidden && name.starts_with('.'))
            }
            _ => false,
        })
    }
}

/// Whether `path` has one of `extensions` (given with a leading dot),
/// ignoring ASCII case.
pub(crate) fn matches_extension(path: &Path, extensions: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Lexically normalizes a path: drops `.` components and resolves `..`
/// against preceding components without touching the disk.
///
/// A `..` that would climb above the root of an absolute path is dropped;
/// leading `..` components of a relative path are kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                normalized.push(component.as_os_str());
                depth = 0;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(name) => {
                normalized.push(name);
                depth += 1;
            }
        }
    }
    normalized
}

/// Async filesystem abstraction.
///
/// # Design Decisions
///
/// ## Async vs Sync
///
/// All methods are async:
/// - **Native**: I/O operations offloaded to the blocking thread pool via tokio::spawn_blocking
/// - **Memory**: In-memory operations that complete immediately
///
/// ## Error Handling
///
/// Uses `std::io::Result<T>`; callers map errors into their own taxonomy.
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync {
    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Read file contents as a string.
    ///
    /// # Errors
    ///
    /// Returns `io::ErrorKind::NotFound` if file doesn't exist.
    /// Returns `io::ErrorKind::InvalidData` if file is not valid UTF-8.
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Read file contents as bytes.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Get file/directory metadata.
    ///
    /// Returns metadata even if the file doesn't exist (exists=false).
    async fn metadata(&self, path: &Path) -> io::Result<FileMetadata>;

    /// Discover files below `root` whose extension is in `extensions`
    /// (e.g. `[".cs", ".csx"]`).
    ///
    /// Returns absolute, lexically normalized paths in sorted order.
    async fn discover_files(
        &self,
        root: &Path,
        extensions: &[&str],
        options: &DiscoveryOptions,
    ) -> io::Result<BTreeSet<PathBuf>>;

    /// Resolve a path against the project root and normalize it lexically.
    async fn normalize_path(&self, path: &Path) -> io::Result<PathBuf>;

    /// The root relative paths are resolved against.
    fn project_root(&self) -> &Path;
}
