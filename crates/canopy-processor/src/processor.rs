//! Concurrent processor.

use crate::aggregate;
use crate::classify::{classify, InputKind};
use crate::error::{Error, Result};
use crate::partition::order_by_size;
use canopy_core::{
    AnalysisEnvelope, AnalysisResult, AnalyzerRegistry, CancellationToken, NormalizeOptions,
};
use canopy_fs::{DiscoveryOptions, FileSystem};
use canopy_manifest::{ProjectManifestParser, SolutionManifestParser};
use std::fmt;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::{self, JoinSet};
use tracing::{debug, info, instrument, warn};

/// Upper bound of the default concurrency limit.
pub const MAX_DEFAULT_CONCURRENCY: usize = 16;

/// `min(2 × available parallelism, 16)`.
pub fn default_max_concurrency() -> usize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    (cores * 2).min(MAX_DEFAULT_CONCURRENCY)
}

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Maximum number of files parsed at once, across all nesting levels.
    pub max_concurrency: usize,
    pub normalize: NormalizeOptions,
    /// Discovery settings for SDK-style scans and directory inputs.
    pub discovery: DiscoveryOptions,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            normalize: NormalizeOptions::default(),
            discovery: DiscoveryOptions::default(),
        }
    }
}

impl ProcessorOptions {
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }
}

/// Processes files, projects and solutions with bounded parallelism.
///
/// A single semaphore limits parse work for the whole processor: project
/// and solution fan-out tasks never hold a permit, only per-file work does,
/// so nesting neither deadlocks nor exceeds `max_concurrency`.
///
/// Cloning is cheap and clones share the limiter and cancellation token.
pub struct Processor<F: ?Sized> {
    fs: Arc<F>,
    registry: Arc<AnalyzerRegistry>,
    options: Arc<ProcessorOptions>,
    limiter: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl<F: ?Sized> Clone for Processor<F> {
    fn clone(&self) -> Self {
        Self {
            fs: Arc::clone(&self.fs),
            registry: Arc::clone(&self.registry),
            options: Arc::clone(&self.options),
            limiter: Arc::clone(&self.limiter),
            cancel: self.cancel.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Processor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("options", &self.options)
            .field("available_permits", &self.limiter.available_permits())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<F> Processor<F>
where
    F: FileSystem + ?Sized + 'static,
{
    /// Creates a processor. A `max_concurrency` of zero is treated as one.
    pub fn new(fs: Arc<F>, registry: Arc<AnalyzerRegistry>, options: ProcessorOptions) -> Self {
        let mut options = options;
        options.max_concurrency = options.max_concurrency.max(1);
        Self {
            fs,
            registry,
            limiter: Arc::new(Semaphore::new(options.max_concurrency)),
            options: Arc::new(options),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` as the cancellation signal for every operation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }

    pub fn max_concurrency(&self) -> usize {
        self.options.max_concurrency
    }

    /// Classifies `path` as solution, project, source file or directory.
    pub async fn classify(&self, path: &Path) -> Result<InputKind> {
        Ok(classify(self.fs.as_ref(), &self.registry, path).await?)
    }

    /// Classifies `path` and processes it accordingly.
    ///
    /// # Errors
    ///
    /// Classification failures, a missing source file, a solution manifest
    /// that cannot be resolved, and cancellation. Parse failures of a single
    /// source file are returned as an envelope whose root is an error node.
    pub async fn process_path(&self, path: &Path) -> Result<AnalysisEnvelope> {
        self.cancel.check()?;
        let kind = self.classify(path).await?;
        debug!("Classified {} as {}", path.display(), kind);
        match kind {
            InputKind::Solution => self.process_solution(path).await,
            InputKind::Project => self.process_project(path).await,
            InputKind::Directory => self.process_directory(path).await,
            InputKind::SourceFile => match self.analyze_file(path).await {
                Ok(root) => Ok(AnalysisEnvelope::new(path.display().to_string(), root)),
                Err(err @ (canopy_core::Error::Cancelled | canopy_core::Error::MissingFile { .. })) => {
                    Err(err.into())
                }
                Err(err) => Ok(AnalysisEnvelope::error(path, &err)),
            },
        }
    }

    /// Processes several inputs of any kind into one `Batch` envelope whose
    /// children follow input order.
    pub async fn process_paths(&self, paths: &[PathBuf]) -> Result<AnalysisEnvelope> {
        let mut children = Vec::with_capacity(paths.len());
        for path in paths {
            children.push(self.process_path(path).await?.root_node);
        }
        Ok(AnalysisEnvelope::new(
            aggregate::BATCH_TYPE.to_lowercase(),
            aggregate::batch_root(children),
        ))
    }

    /// Parses a single source file.
    ///
    /// Returns `Ok(None)` when the file is missing or no analyzer claims it.
    ///
    /// # Errors
    ///
    /// Parse failures (including non-UTF-8 content), I/O failures and
    /// cancellation.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> Result<Option<AnalysisEnvelope>> {
        match self.analyze_file(path).await {
            Ok(root) => Ok(Some(AnalysisEnvelope::new(path.display().to_string(), root))),
            Err(err @ (canopy_core::Error::MissingFile { .. } | canopy_core::Error::NoAnalyzer { .. })) => {
                debug!("Skipping {}: {}", path.display(), err);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves a project manifest and parses every source file in it.
    ///
    /// Children are sorted by path. A file that fails contributes an error
    /// node; a manifest that cannot be read yields an envelope whose root is
    /// an error node.
    ///
    /// # Errors
    ///
    /// Only cancellation.
    #[instrument(skip_all, fields(path = %manifest_path.display()))]
    pub async fn process_project(&self, manifest_path: &Path) -> Result<AnalysisEnvelope> {
        self.cancel.check()?;
        let parser = ProjectManifestParser::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.registry),
            self.options.discovery.clone(),
        );
        let resolved = match parser.resolve(manifest_path).await {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("Failed to resolve project {}: {}", manifest_path.display(), err);
                let err = err.into_core(manifest_path);
                return Ok(AnalysisEnvelope::error(manifest_path, &err));
            }
        };
        self.cancel.check()?;

        let results = self.analyze_files(&resolved.source_files).await?;
        let children = aggregate::sorted_by_path(
            results
                .into_iter()
                .map(|(path, result)| {
                    let node = result.unwrap_or_else(|err| AnalysisResult::from_error(&path, &err));
                    (path, node)
                })
                .collect(),
        );
        let root = aggregate::project_root(&resolved, children);
        info!(
            "Processed project {} ({} files, {} errors, {})",
            resolved.manifest_path.display(),
            resolved.source_files.len(),
            aggregate::error_count(&root.children),
            resolved.mode
        );
        Ok(AnalysisEnvelope::new(
            resolved.manifest_path.display().to_string(),
            root,
        ))
    }

    /// Resolves a solution and processes every processable project in it.
    ///
    /// Children are sorted by project path. A project that fails entirely
    /// contributes an error node.
    ///
    /// # Errors
    ///
    /// The solution manifest cannot be read or parsed, or cancellation.
    #[instrument(skip_all, fields(path = %solution_path.display()))]
    pub async fn process_solution(&self, solution_path: &Path) -> Result<AnalysisEnvelope> {
        self.cancel.check()?;
        let parser = SolutionManifestParser::new(Arc::clone(&self.fs), Arc::clone(&self.registry));
        let solution = parser
            .resolve(solution_path)
            .await
            .map_err(|source| Error::Solution {
                path: solution_path.to_path_buf(),
                source,
            })?;

        let mut tasks = JoinSet::new();
        for project in solution.project_paths() {
            let this = self.clone();
            let project = project.to_path_buf();
            tasks.spawn(async move {
                let envelope = this.process_project(&project).await;
                (project, envelope)
            });
        }

        let mut projects = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (path, envelope) = joined_or_cancelled(joined, &mut tasks)?;
            let node = match envelope {
                Ok(envelope) => envelope.root_node,
                Err(err) if err.is_cancelled() => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(err) => AnalysisResult::error(&path, "ManifestFailure", err.to_string()),
            };
            projects.push((path, node));
        }
        self.cancel.check()?;

        let root = aggregate::solution_root(&solution, aggregate::sorted_by_path(projects));
        info!(
            "Processed solution {} ({} projects, {} errors)",
            solution.path.display(),
            root.children.len(),
            aggregate::error_count(&root.children)
        );
        Ok(AnalysisEnvelope::new(solution.path.display().to_string(), root))
    }

    /// Parses every analyzer-claimed file below `dir`, the same set an
    /// SDK-style project in that directory would scan.
    ///
    /// # Errors
    ///
    /// The directory cannot be walked, or cancellation.
    #[instrument(skip_all, fields(path = %dir.display()))]
    pub async fn process_directory(&self, dir: &Path) -> Result<AnalysisEnvelope> {
        self.cancel.check()?;
        let parser = ProjectManifestParser::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.registry),
            self.options.discovery.clone(),
        );
        let files = parser.scan(dir).await.map_err(|err| err.into_core(dir))?;

        let results = self.analyze_files(&files).await?;
        let children = aggregate::sorted_by_path(
            results
                .into_iter()
                .map(|(path, result)| {
                    let node = result.unwrap_or_else(|err| AnalysisResult::from_error(&path, &err));
                    (path, node)
                })
                .collect(),
        );
        info!("Processed directory {} ({} files)", dir.display(), files.len());
        Ok(AnalysisEnvelope::new(
            dir.display().to_string(),
            aggregate::directory_root(dir, files.len(), children),
        ))
    }

    /// Parses a batch of files, returning one envelope per input in input
    /// order. Inputs that are missing, unclaimed or fail to parse yield an
    /// envelope whose root is an error node.
    ///
    /// # Errors
    ///
    /// Only cancellation, which aborts the whole batch.
    pub async fn process_multiple_files(&self, paths: &[PathBuf]) -> Result<Vec<AnalysisEnvelope>> {
        self.cancel.check()?;
        let results = self.analyze_files(paths).await?;
        Ok(results
            .into_iter()
            .map(|(path, result)| match result {
                Ok(root) => AnalysisEnvelope::new(path.display().to_string(), root),
                Err(err) => AnalysisEnvelope::error(&path, &err),
            })
            .collect())
    }

    /// Fans out [`Self::analyze_file`] over `paths`, largest file first.
    /// Results are returned in input order.
    async fn analyze_files(
        &self,
        paths: &[PathBuf],
    ) -> canopy_core::Result<Vec<(PathBuf, canopy_core::Result<AnalysisResult>)>> {
        let order = order_by_size(self.fs.as_ref(), paths).await;

        let mut tasks = JoinSet::new();
        for index in order {
            let this = self.clone();
            let path = paths[index].clone();
            tasks.spawn(async move {
                let result = this.analyze_file(&path).await;
                (index, path, result)
            });
        }

        let mut slots: Vec<Option<(PathBuf, canopy_core::Result<AnalysisResult>)>> =
            (0..paths.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, path, result) = match joined {
                Ok(item) => item,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => return Err(canopy_core::Error::Cancelled),
            };
            if matches!(&result, Err(err) if err.is_cancelled()) {
                tasks.abort_all();
                return Err(canopy_core::Error::Cancelled);
            }
            slots[index] = Some((path, result));
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Reads and parses one file while holding a concurrency permit.
    async fn analyze_file(&self, path: &Path) -> canopy_core::Result<AnalysisResult> {
        self.cancel.check()?;
        let analyzer = self
            .registry
            .analyzer_for_file(path)
            .ok_or_else(|| canopy_core::Error::NoAnalyzer {
                path: path.to_path_buf(),
            })?;

        let _permit = self.acquire().await?;
        let missing = || canopy_core::Error::MissingFile {
            path: path.to_path_buf(),
        };
        if !self.fs.metadata(path).await?.is_file {
            return Err(missing());
        }
        let source = match self.fs.read_to_string(path).await {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(missing()),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(canopy_core::Error::Parse {
                    path: path.to_path_buf(),
                    message: format!("File is not valid UTF-8: {}", e),
                })
            }
            Err(e) => return Err(e.into()),
        };
        self.cancel.check()?;

        let options = self.options.normalize;
        let owned = path.to_path_buf();
        let result = task::spawn_blocking(move || analyzer.analyze(&source, &owned, &options))
            .await
            .map_err(|e| canopy_core::Error::Parse {
                path: path.to_path_buf(),
                message: format!("Parser task failed: {}", e),
            })?;
        self.cancel.check()?;

        match &result {
            Ok(root) => debug!("Parsed {} ({} nodes)", path.display(), root.node_count()),
            Err(err) => warn!("Failed to parse {}: {}", path.display(), err),
        }
        result
    }

    async fn acquire(&self) -> canopy_core::Result<SemaphorePermit<'_>> {
        tokio::select! {
            permit = self.limiter.acquire() => permit.map_err(|_| canopy_core::Error::Cancelled),
            _ = self.cancel.cancelled() => Err(canopy_core::Error::Cancelled),
        }
    }
}

fn joined_or_cancelled<T: 'static>(
    joined: std::result::Result<T, task::JoinError>,
    tasks: &mut JoinSet<T>,
) -> Result<T> {
    match joined {
        Ok(item) => Ok(item),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => {
            tasks.abort_all();
            Err(canopy_core::Error::Cancelled.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_aborted_worker_reports_cancellation() {
        let mut tasks = JoinSet::new();
        tasks.spawn(std::future::pending::<()>());
        tasks.abort_all();
        let joined = tasks.join_next().await.unwrap();
        let err = joined_or_cancelled(joined, &mut tasks).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_default_max_concurrency_is_bounded() {
        let n = default_max_concurrency();
        assert!(n >= 1);
        assert!(n <= MAX_DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let fs = Arc::new(canopy_fs::MemoryFileSystem::new("/"));
        let processor = Processor::new(
            fs,
            canopy_backend_csharp::default_registry(),
            ProcessorOptions::default().with_max_concurrency(0),
        );
        assert_eq!(processor.max_concurrency(), 1);
    }
}
