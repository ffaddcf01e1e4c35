//! Aggregate-tree assembly for project, solution, directory and batch runs.

use canopy_core::{AnalysisResult, SourceLocation};
use canopy_manifest::{ResolvedManifest, SolutionDescriptor};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const PROJECT_TYPE: &str = "Project";
pub const PROJECT_KIND: &str = "ProjectManifest";
pub const SOLUTION_TYPE: &str = "Solution";
pub const SOLUTION_KIND: &str = "SolutionManifest";
pub const DIRECTORY_TYPE: &str = "Directory";
pub const DIRECTORY_KIND: &str = "DirectoryScan";
pub const BATCH_TYPE: &str = "Batch";
pub const BATCH_KIND: &str = "Batch";

/// Orders children by their source path, discarding completion order.
pub fn sorted_by_path(mut items: Vec<(PathBuf, AnalysisResult)>) -> Vec<AnalysisResult> {
    items.sort_by(|(a, _), (b, _)| a.cmp(b));
    items.into_iter().map(|(_, node)| node).collect()
}

/// Number of error nodes below (not including) the given children.
pub fn error_count(children: &[AnalysisResult]) -> usize {
    children.iter().map(|child| child.error_nodes().len()).sum()
}

fn paths_value<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Value {
    paths
        .into_iter()
        .map(|p| Value::String(p.display().to_string()))
        .collect()
}

fn root(type_tag: &str, kind_tag: &str, path: &Path, children: Vec<AnalysisResult>) -> AnalysisResult {
    let errors = error_count(&children);
    let mut node = AnalysisResult::new(type_tag, kind_tag);
    node.location = SourceLocation::for_path(path);
    node.children = children;
    node.with_attribute("errorCount", errors)
}

pub fn project_root(resolved: &ResolvedManifest, children: Vec<AnalysisResult>) -> AnalysisResult {
    let mut node = root(PROJECT_TYPE, PROJECT_KIND, &resolved.manifest_path, children);
    node.source_text = resolved.manifest_path.display().to_string();
    let node = node
        .with_attribute("manifestPath", resolved.manifest_path.display().to_string())
        .with_attribute("resolution", resolved.mode.as_str())
        .with_attribute("sourceFileCount", resolved.source_files.len())
        .with_attribute(
            "projectReferences",
            paths_value(resolved.project_references.iter().map(PathBuf::as_path)),
        )
        .with_attribute("targetFrameworks", resolved.target_frameworks.clone());
    match &resolved.sdk {
        Some(sdk) => node.with_attribute("sdk", sdk.as_str()),
        None => node,
    }
}

pub fn solution_root(solution: &SolutionDescriptor, children: Vec<AnalysisResult>) -> AnalysisResult {
    let mut node = root(SOLUTION_TYPE, SOLUTION_KIND, &solution.path, children);
    node.source_text = solution.path.display().to_string();
    let optional = |value: &Option<String>| match value {
        Some(v) => Value::String(v.clone()),
        None => Value::Null,
    };
    node.with_attribute("name", solution.name.as_str())
        .with_attribute("manifestPath", solution.path.display().to_string())
        .with_attribute("formatVersion", optional(&solution.format_version))
        .with_attribute("toolVersion", optional(&solution.tool_version))
        .with_attribute("minimumToolVersion", optional(&solution.minimum_tool_version))
        .with_attribute("projectCount", solution.project_paths().len())
        .with_attribute(
            "unsupportedProjects",
            paths_value(solution.unsupported_projects().iter().map(|p| p.path.as_path())),
        )
        .with_attribute(
            "missingProjects",
            paths_value(solution.missing_projects().iter().map(|p| p.path.as_path())),
        )
}

pub fn directory_root(dir: &Path, file_count: usize, children: Vec<AnalysisResult>) -> AnalysisResult {
    let mut node = root(DIRECTORY_TYPE, DIRECTORY_KIND, dir, children);
    node.source_text = dir.display().to_string();
    node.with_attribute("sourceFileCount", file_count)
}

/// Root for an explicit list of inputs; children keep input order.
pub fn batch_root(children: Vec<AnalysisResult>) -> AnalysisResult {
    let count = children.len();
    let mut node = AnalysisResult::new(BATCH_TYPE, BATCH_KIND);
    let errors = error_count(&children);
    node.children = children;
    node.with_attribute("inputCount", count)
        .with_attribute("errorCount", errors)
}
