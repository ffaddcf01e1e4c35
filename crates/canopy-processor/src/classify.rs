//! Input classification.

use canopy_core::{AnalyzerRegistry, Error, Result};
use canopy_fs::FileSystem;
use canopy_manifest::is_solution_path;
use std::fmt;
use std::path::Path;

/// What kind of input a path denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Solution,
    Project,
    SourceFile,
    Directory,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Solution => "solution",
            InputKind::Project => "project",
            InputKind::SourceFile => "source file",
            InputKind::Directory => "directory",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies `path` using only the registry and the solution extension check.
///
/// Existing directories are always [`InputKind::Directory`]. A path that is
/// neither a directory nor claimed by any analyzer is a classification error.
pub async fn classify<F>(fs: &F, registry: &AnalyzerRegistry, path: &Path) -> Result<InputKind>
where
    F: FileSystem + ?Sized,
{
    let metadata = fs.metadata(path).await?;
    if metadata.is_dir {
        return Ok(InputKind::Directory);
    }
    if is_solution_path(path) {
        return Ok(InputKind::Solution);
    }
    if registry.is_project_supported(path) {
        return Ok(InputKind::Project);
    }
    if registry.is_file_supported(path) {
        return Ok(InputKind::SourceFile);
    }
    Err(Error::Classification {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_fs::MemoryFileSystem;

    #[tokio::test]
    async fn test_classify_by_registry() {
        let fs = MemoryFileSystem::new("/repo")
            .with_file("/repo/App.sln", "")
            .with_file("/repo/App/App.csproj", "<Project />")
            .with_file("/repo/App/Program.cs", "class P {}")
            .with_file("/repo/README.md", "# readme");
        let registry = canopy_backend_csharp::default_registry();

        let kind = |p: &'static str| {
            let fs = &fs;
            let registry = &registry;
            async move { classify(fs, registry, Path::new(p)).await }
        };

        assert_eq!(kind("/repo/App.sln").await.unwrap(), InputKind::Solution);
        assert_eq!(kind("/repo/App/App.csproj").await.unwrap(), InputKind::Project);
        assert_eq!(kind("/repo/App/Program.cs").await.unwrap(), InputKind::SourceFile);
        assert_eq!(kind("/repo/App").await.unwrap(), InputKind::Directory);

        let err = kind("/repo/README.md").await.unwrap_err();
        assert_eq!(err.kind_name(), "Classification");
    }

    #[tokio::test]
    async fn test_missing_source_file_is_still_classified() {
        let fs = MemoryFileSystem::new("/repo");
        let registry = canopy_backend_csharp::default_registry();
        let kind = classify(&fs, &registry, Path::new("/repo/Gone.cs"))
            .await
            .unwrap();
        assert_eq!(kind, InputKind::SourceFile);
    }
}
