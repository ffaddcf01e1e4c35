//! In-memory filesystem, used for tests and embedding.

use crate::file_system::{matches_extension, normalize_lexically};
use crate::{DiscoveryOptions, FileMetadata, FileSystem};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// In-memory filesystem.
///
/// Directories are implicit: a directory exists when at least one stored
/// file lives below it. Relative paths resolve against the project root.
///
/// # Thread Safety
///
/// Uses `Arc<RwLock<BTreeMap>>`, so clones share the same files.
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    project_root: PathBuf,
    files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MemoryFileSystem {
    /// Create an empty filesystem rooted at `project_root` (e.g. "/repo").
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: normalize_lexically(&Path::new("/").join(project_root.as_ref())),
            files: Arc::default(),
        }
    }

    /// Add or replace a file.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let resolved = self.resolve(path.as_ref());
        self.files.write().insert(resolved, contents.into());
    }

    /// Builder-style [`add_file`](Self::add_file).
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, contents);
        self
    }

    /// Remove a file, returning whether it existed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        let resolved = self.resolve(path.as_ref());
        self.files.write().remove(&resolved).is_some()
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        normalize_lexically(&self.project_root.join(path))
    }

    fn is_dir(files: &BTreeMap<PathBuf, Vec<u8>>, path: &Path) -> bool {
        files
            .range(path.to_path_buf()..)
            .take_while(|(key, _)| key.starts_with(path))
            .any(|(key, _)| key != path)
    }
}

#[async_trait::async_trait]
impl FileSystem for MemoryFileSystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        let resolved = self.resolve(path);
        let files = self.files.read();
        Ok(files.contains_key(&resolved) || Self::is_dir(&files, &resolved))
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let resolved = self.resolve(path);
        self.files.read().get(&resolved).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {}", resolved.display()),
            )
        })
    }

    async fn metadata(&self, path: &Path) -> io::Result<FileMetadata> {
        let resolved = self.resolve(path);
        let files = self.files.read();
        Ok(match files.get(&resolved) {
            Some(contents) => FileMetadata {
                exists: true,
                is_file: true,
                size: contents.len() as u64,
                ..FileMetadata::default()
            },
            None if Self::is_dir(&files, &resolved) => FileMetadata {
                exists: true,
                is_dir: true,
                ..FileMetadata::default()
            },
            None => FileMetadata::missing(),
        })
    }

    async fn discover_files(
        &self,
        root: &Path,
        extensions: &[&str],
        options: &DiscoveryOptions,
    ) -> io::Result<BTreeSet<PathBuf>> {
        let root = self.resolve(root);
        let files = self.files.read();
        let discovered = files
            .range(root.clone()..)
            .take_while(|(path, _)| path.starts_with(&root))
            .filter(|(path, contents)| {
                let Ok(relative) = path.strip_prefix(&root) else {
                    return false;
                };
                let depth = relative.components().count();
                if depth == 0 || depth > options.max_depth {
                    return false;
                }
                if options.skips_relative(relative) {
                    return false;
                }
                let hidden_file = relative
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with('.'));
                if hidden_file && !options.include_hidden {
                    return false;
                }
                if options
                    .max_file_size
                    .is_some_and(|max| contents.len() as u64 > max)
                {
                    return false;
                }
                matches_extension(path, extensions)
            })
            .map(|(path, _)| path.clone())
            .collect();
        Ok(discovered)
    }

    async fn normalize_path(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(self.resolve(path))
    }

    fn project_root(&self) -> &Path {
        &self.project_root
    }
}
