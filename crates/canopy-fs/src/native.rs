//! Native filesystem implementation using std::fs + tokio.

use crate::file_system::{matches_extension, normalize_lexically};
use crate::{DiscoveryOptions, FileMetadata, FileSystem};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, warn};

/// Native filesystem implementation using std::fs + tokio.
///
/// Blocking std::fs calls are wrapped in `tokio::task::spawn_blocking`.
///
/// A *scoped* filesystem ([`NativeFileSystem::new`]) rejects any path
/// outside its root. An *unscoped* one ([`NativeFileSystem::unscoped`]) only
/// uses the root to anchor relative paths, since project items may live
/// outside the project directory (`../Shared/C.cs`).
#[derive(Debug, Clone)]
pub struct NativeFileSystem {
    project_root: PathBuf,
    canonical_root: Option<PathBuf>,
}

impl NativeFileSystem {
    /// Create a filesystem scoped to a project root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root doesn't exist or can't be canonicalized.
    pub fn new(project_root: impl AsRef<Path>) -> io::Result<Self> {
        let canonical = project_root.as_ref().canonicalize().map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "Project root does not exist: {}",
                    project_root.as_ref().display()
                ),
            )
        })?;
        Ok(Self {
            project_root: canonical.clone(),
            canonical_root: Some(canonical),
        })
    }

    /// Create a filesystem that accepts any path. Relative paths resolve
    /// against `anchor`, which is made absolute using the current directory.
    pub fn unscoped(anchor: impl AsRef<Path>) -> io::Result<Self> {
        let anchor = anchor.as_ref();
        let absolute = if anchor.is_absolute() {
            anchor.to_path_buf()
        } else {
            std::env::current_dir()?.join(anchor)
        };
        Ok(Self {
            project_root: normalize_lexically(&absolute),
            canonical_root: None,
        })
    }

    /// Whether operations are restricted to the project root.
    pub fn is_scoped(&self) -> bool {
        self.canonical_root.is_some()
    }

    /// Resolve a path and, for scoped filesystems, check that it stays
    /// within the project root.
    fn validate_path(&self, path: &Path) -> io::Result<PathBuf> {
        let absolute = normalize_lexically(&self.project_root.join(path));

        let Some(root) = &self.canonical_root else {
            return Ok(absolute);
        };

        // follow symlinks when the path exists
        let resolved = absolute.canonicalize().unwrap_or_else(|_| absolute.clone());
        if !resolved.starts_with(root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "Path traversal detected: {} is outside project root {}",
                    absolute.display(),
                    root.display()
                ),
            ));
        }

        Ok(absolute)
    }
}

#[async_trait::async_trait]
impl FileSystem for NativeFileSystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        let validated = self.validate_path(path)?;
        task::spawn_blocking(move || Ok(validated.exists()))
            .await
            .map_err(io::Error::other)?
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let validated = self.validate_path(path)?;
        task::spawn_blocking(move || std::fs::read_to_string(&validated))
            .await
            .map_err(io::Error::other)?
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let validated = self.validate_path(path)?;
        task::spawn_blocking(move || std::fs::read(&validated))
            .await
            .map_err(io::Error::other)?
    }

    async fn metadata(&self, path: &Path) -> io::Result<FileMetadata> {
        let validated = self.validate_path(path)?;
        task::spawn_blocking(move || match std::fs::metadata(&validated) {
            Ok(meta) => Ok(FileMetadata {
                exists: true,
                is_file: meta.is_file(),
                is_dir: meta.is_dir(),
                is_symlink: std::fs::symlink_metadata(&validated)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false),
                size: if meta.is_file() { meta.len() } else { 0 },
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FileMetadata::missing()),
            Err(e) => Err(e),
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn discover_files(
        &self,
        root: &Path,
        extensions: &[&str],
        options: &DiscoveryOptions,
    ) -> io::Result<BTreeSet<PathBuf>> {
        let validated_root = self.validate_path(root)?;
        let extensions: Vec<String> = extensions.iter().map(|s| s.to_string()).collect();
        let opts = options.clone();

        task::spawn_blocking(move || discover_files_sync(&validated_root, &extensions, &opts))
            .await
            .map_err(io::Error::other)?
    }

    async fn normalize_path(&self, path: &Path) -> io::Result<PathBuf> {
        self.validate_path(path)
    }

    fn project_root(&self) -> &Path {
        &self.project_root
    }
}

/// Synchronous file discovery.
fn discover_files_sync(
    root: &Path,
    extensions: &[String],
    options: &DiscoveryOptions,
) -> io::Result<BTreeSet<PathBuf>> {
    let mut discovered = BTreeSet::new();
    if !root.is_dir() {
        return Ok(discovered);
    }

    let excluded: Vec<String> = options
        .excluded_dirs
        .iter()
        .map(|dir| dir.to_ascii_lowercase())
        .collect();

    let mut walker = WalkBuilder::new(root);
    walker
        .follow_links(options.follow_symlinks)
        .hidden(!options.include_hidden)
        .git_ignore(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .git_global(options.respect_gitignore)
        .ignore(options.respect_gitignore)
        .parents(options.respect_gitignore)
        .require_git(false)
        .max_depth(Some(options.max_depth))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            !excluded.contains(&name)
        });

    let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
    for result in walker.build() {
        // one unreadable entry or symlink loop must not hide its siblings
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping entry under {}: {}", root.display(), err);
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        if !matches_extension(path, &extensions) {
            continue;
        }
        if let Some(max) = options.max_file_size {
            let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
            if size > max {
                debug!(
                    "Skipping {} ({} bytes exceeds the {} byte limit)",
                    path.display(),
                    size,
                    max
                );
                continue;
            }
        }
        discovered.insert(normalize_lexically(path));
    }

    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unscoped_accepts_outside_paths() {
        let temp_dir = TempDir::new().unwrap();
        let fs = NativeFileSystem::unscoped(temp_dir.path().join("App")).unwrap();
        assert!(!fs.is_scoped());
        let validated = fs.validate_path(Path::new("../Shared/C.cs")).unwrap();
        assert_eq!(validated, normalize_lexically(&temp_dir.path().join("Shared/C.cs")));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_errors_do_not_hide_siblings() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("Loop")).unwrap();
        std::fs::write(root.join("A.cs"), "a").unwrap();
        std::fs::write(root.join("Loop/B.cs"), "b").unwrap();
        std::os::unix::fs::symlink(root, root.join("Loop/back")).unwrap();
        std::os::unix::fs::symlink(root.join("gone"), root.join("Dangling.cs")).unwrap();

        let options = DiscoveryOptions {
            follow_symlinks: true,
            ..DiscoveryOptions::default()
        };
        let discovered = discover_files_sync(root, &[".cs".to_string()], &options).unwrap();
        let names: Vec<_> = discovered
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["A.cs", "Loop/B.cs"]);
    }

    #[test]
    fn test_scoped_rejects_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let fs = NativeFileSystem::new(temp_dir.path()).unwrap();
        let err = fs.validate_path(Path::new("../outside.cs")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
