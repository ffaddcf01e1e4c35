//! Analyzer registry.
//!
//! Resolves which analyzer(s), if any, can process a path, without callers
//! knowing concrete extension lists. Single-result lookups are memoized per
//! normalized extension.

use crate::analyzer::Analyzer;
use crate::capability::{extension_of, AnalyzerCapability};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

type Factory = Box<dyn Fn() -> Vec<Arc<dyn Analyzer>> + Send + Sync>;

/// Extension → index into the analyzer list. `None` caches a miss.
type LookupCache = RwLock<HashMap<String, Option<usize>>>;

#[derive(Clone, Copy)]
enum Direction {
    File,
    Project,
}

impl Direction {
    fn claims(self, capability: &AnalyzerCapability, extension: &str) -> bool {
        match self {
            Direction::File => capability.file_extensions().contains(extension),
            Direction::Project => capability.project_extensions().contains(extension),
        }
    }
}

/// Registry of analyzers.
///
/// The analyzer set is fixed once constructed. A registry built with
/// [`AnalyzerRegistry::lazy`] runs its factory exactly once, on first use,
/// even under concurrent access.
pub struct AnalyzerRegistry {
    analyzers: OnceLock<Vec<Arc<dyn Analyzer>>>,
    factory: Option<Factory>,
    file_cache: LookupCache,
    project_cache: LookupCache,
}

impl AnalyzerRegistry {
    /// Creates a registry over an explicit analyzer list. Registration order
    /// is the tie-break: the first analyzer claiming an extension wins.
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        Self {
            analyzers: OnceLock::from(analyzers),
            factory: None,
            file_cache: RwLock::default(),
            project_cache: RwLock::default(),
        }
    }

    /// Creates a registry whose analyzers are built on first use.
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Vec<Arc<dyn Analyzer>> + Send + Sync + 'static,
    {
        Self {
            analyzers: OnceLock::new(),
            factory: Some(Box::new(factory)),
            file_cache: RwLock::default(),
            project_cache: RwLock::default(),
        }
    }

    /// All registered analyzers, in registration order.
    pub fn all_analyzers(&self) -> &[Arc<dyn Analyzer>] {
        self.analyzers.get_or_init(|| match &self.factory {
            Some(factory) => factory(),
            None => Vec::new(),
        })
    }

    /// The analyzer owning the path's source-file extension.
    pub fn analyzer_for_file(&self, path: &Path) -> Option<Arc<dyn Analyzer>> {
        self.lookup(path, Direction::File)
    }

    /// The analyzer owning the path's project-manifest extension.
    pub fn analyzer_for_project(&self, path: &Path) -> Option<Arc<dyn Analyzer>> {
        self.lookup(path, Direction::Project)
    }

    pub fn is_file_supported(&self, path: &Path) -> bool {
        self.analyzer_for_file(path).is_some()
    }

    pub fn is_project_supported(&self, path: &Path) -> bool {
        self.analyzer_for_project(path).is_some()
    }

    /// Every analyzer claiming the path's source-file extension.
    pub fn analyzers_for_file(&self, path: &Path) -> Vec<Arc<dyn Analyzer>> {
        self.matching(path, Direction::File)
    }

    /// Every analyzer claiming the path's project-manifest extension.
    pub fn analyzers_for_project(&self, path: &Path) -> Vec<Arc<dyn Analyzer>> {
        self.matching(path, Direction::Project)
    }

    /// Finds an analyzer by name, ignoring ASCII case.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn Analyzer>> {
        self.all_analyzers()
            .iter()
            .find(|analyzer| analyzer.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Union of every analyzer's source-file extensions.
    pub fn supported_file_extensions(&self) -> BTreeSet<String> {
        self.all_analyzers()
            .iter()
            .flat_map(|analyzer| analyzer.capability().file_extensions().iter().cloned())
            .collect()
    }

    /// Union of every analyzer's project-manifest extensions.
    pub fn supported_project_extensions(&self) -> BTreeSet<String> {
        self.all_analyzers()
            .iter()
            .flat_map(|analyzer| analyzer.capability().project_extensions().iter().cloned())
            .collect()
    }

    /// Drops memoized lookups. The analyzer set itself is kept.
    pub fn clear_caches(&self) {
        self.file_cache.write().clear();
        self.project_cache.write().clear();
    }

    /// Number of memoized file and project lookups.
    pub fn cached_lookups(&self) -> (usize, usize) {
        (self.file_cache.read().len(), self.project_cache.read().len())
    }

    fn cache(&self, direction: Direction) -> &LookupCache {
        match direction {
            Direction::File => &self.file_cache,
            Direction::Project => &self.project_cache,
        }
    }

    fn lookup(&self, path: &Path, direction: Direction) -> Option<Arc<dyn Analyzer>> {
        let extension = extension_of(path)?;
        let analyzers = self.all_analyzers();
        let cache = self.cache(direction);

        if let Some(hit) = cache.read().get(&extension).copied() {
            return hit.and_then(|index| analyzers.get(index).cloned());
        }

        let found = analyzers
            .iter()
            .position(|analyzer| direction.claims(analyzer.capability(), &extension));
        // first writer wins; racing writers computed the same answer
        let index = *cache.write().entry(extension).or_insert(found);
        index.and_then(|index| analyzers.get(index).cloned())
    }

    fn matching(&self, path: &Path, direction: Direction) -> Vec<Arc<dyn Analyzer>> {
        let Some(extension) = extension_of(path) else {
            return Vec::new();
        };
        self.all_analyzers()
            .iter()
            .filter(|analyzer| direction.claims(analyzer.capability(), &extension))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Option<Vec<&str>> = self
            .analyzers
            .get()
            .map(|analyzers| analyzers.iter().map(|a| a.name()).collect());
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &names)
            .field("lazy", &self.factory.is_some())
            .finish()
    }
}
