//! Project manifest resolution.
//!
//! Produces the authoritative list of source files belonging to a project
//! manifest. Two dialects exist: SDK-style manifests include files
//! implicitly by directory convention, legacy manifests list every item
//! explicitly.

use crate::error::{Error, Result};
use crate::glob::{comparable, split_item_list, ItemPattern};
use canopy_core::AnalyzerRegistry;
use canopy_fs::{normalize_lexically, DiscoveryOptions, FileSystem};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Directory names skipped by implicit and fallback scans.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "bin",
    "obj",
    "packages",
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    ".vs",
    ".vscode",
    ".idea",
];

/// Item types whose entries denote source, content or resource files.
pub const SOURCE_ITEM_TYPES: &[&str] = &[
    "Compile",
    "Content",
    "EmbeddedResource",
    "Page",
    "ApplicationDefinition",
];

/// Manifest dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectDialect {
    /// Declares an SDK; files are included by directory convention.
    Sdk,
    /// Lists every item explicitly.
    Legacy,
}

/// How the source list of a [`ResolvedManifest`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    Sdk,
    Legacy,
    /// The manifest document could not be parsed; a directory scan was used.
    Fallback,
}

impl ResolutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMode::Sdk => "sdk",
            ResolutionMode::Legacy => "legacy",
            ResolutionMode::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item element inside an `ItemGroup`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectItem {
    /// Element name, e.g. `Compile`.
    pub item_type: String,
    pub include: Vec<String>,
    pub remove: Vec<String>,
    pub exclude: Vec<String>,
}

impl ProjectItem {
    pub fn is_source_item(&self) -> bool {
        SOURCE_ITEM_TYPES
            .iter()
            .any(|kind| kind.eq_ignore_ascii_case(&self.item_type))
    }
}

/// Parsed project manifest document. Conditions are not evaluated: every
/// declared item and property is collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDocument {
    pub dialect: ProjectDialect,
    /// SDK name, when declared.
    pub sdk: Option<String>,
    /// Properties in declaration order.
    pub properties: Vec<(String, String)>,
    /// Items in declaration order.
    pub items: Vec<ProjectItem>,
}

impl ProjectDocument {
    /// Value of a property, ignoring case; the last declaration wins.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether implicit directory inclusion is active. Only meaningful for
    /// SDK-style documents.
    pub fn default_items_enabled(&self) -> bool {
        let disabled = |name| {
            self.property(name)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("false"))
        };
        !disabled("EnableDefaultItems") && !disabled("EnableDefaultCompileItems")
    }

    /// `Include` values of `ProjectReference` items.
    pub fn project_references(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|item| item.item_type.eq_ignore_ascii_case("ProjectReference"))
            .flat_map(|item| item.include.iter().map(String::as_str))
    }

    /// Target frameworks from `TargetFramework` or `TargetFrameworks`.
    pub fn target_frameworks(&self) -> Vec<String> {
        self.property("TargetFrameworks")
            .or_else(|| self.property("TargetFramework"))
            .or_else(|| self.property("TargetFrameworkVersion"))
            .map(split_item_list)
            .unwrap_or_default()
    }

    pub fn source_items(&self) -> impl Iterator<Item = &ProjectItem> {
        self.items.iter().filter(|item| item.is_source_item())
    }
}

/// Parses a project manifest document.
///
/// The root element must be `Project`. The dialect is SDK-style when the
/// root carries an `Sdk` attribute, or when the project declares an
/// `<Sdk Name="..."/>` element or an `<Import Sdk="..."/>`.
pub fn parse_project_document(text: &str) -> Result<ProjectDocument> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut document = ProjectDocument {
        dialect: ProjectDialect::Legacy,
        sdk: None,
        properties: Vec::new(),
        items: Vec::new(),
    };
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut property_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = local_name(&element);
                if stack.is_empty() {
                    open_root(&mut document, &element, &name, &mut saw_root)?;
                } else {
                    visit_element(&mut document, &stack, &element, &name)?;
                }
                property_text.clear();
                stack.push(name);
            }
            Event::Empty(element) => {
                let name = local_name(&element);
                if stack.is_empty() {
                    open_root(&mut document, &element, &name, &mut saw_root)?;
                } else {
                    visit_element(&mut document, &stack, &element, &name)?;
                    if in_property_group(&stack) {
                        document.properties.push((name, String::new()));
                    }
                }
            }
            Event::Text(text) => {
                if stack.len() >= 3 && in_property_group(&stack[..stack.len() - 1]) {
                    property_text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if stack.len() >= 3 && in_property_group(&stack[..stack.len() - 1]) {
                    property_text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err(Error::InvalidDocument("unbalanced end tag".to_string()));
                };
                if in_property_group(&stack) {
                    document
                        .properties
                        .push((name, std::mem::take(&mut property_text).trim().to_string()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::InvalidDocument("missing Project element".to_string()));
    }
    if !stack.is_empty() {
        return Err(Error::InvalidDocument(format!(
            "unclosed element <{}>",
            stack.join("><")
        )));
    }
    Ok(document)
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attribute(element: &BytesStart<'_>, wanted: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref().eq_ignore_ascii_case(wanted.as_bytes()) {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn open_root(
    document: &mut ProjectDocument,
    element: &BytesStart<'_>,
    name: &str,
    saw_root: &mut bool,
) -> Result<()> {
    if *saw_root {
        return Err(Error::InvalidDocument("multiple root elements".to_string()));
    }
    if name != "Project" {
        return Err(Error::InvalidDocument(format!(
            "expected <Project> root, found <{}>",
            name
        )));
    }
    *saw_root = true;
    if let Some(sdk) = attribute(element, "Sdk")?.filter(|s| !s.trim().is_empty()) {
        document.dialect = ProjectDialect::Sdk;
        document.sdk = Some(sdk);
    }
    Ok(())
}

fn in_property_group(stack: &[String]) -> bool {
    stack.last().is_some_and(|name| name == "PropertyGroup") && !inside_target(stack)
}

fn inside_target(stack: &[String]) -> bool {
    stack.iter().any(|name| name == "Target")
}

fn visit_element(
    document: &mut ProjectDocument,
    stack: &[String],
    element: &BytesStart<'_>,
    name: &str,
) -> Result<()> {
    let parent = stack.last().map(String::as_str);

    match (parent, name) {
        (Some("Project"), "Sdk") => {
            if let Some(sdk) = attribute(element, "Name")? {
                document.dialect = ProjectDialect::Sdk;
                document.sdk.get_or_insert(sdk);
            }
        }
        (Some("Project"), "Import") => {
            if let Some(sdk) = attribute(element, "Sdk")? {
                document.dialect = ProjectDialect::Sdk;
                document.sdk.get_or_insert(sdk);
            }
        }
        (Some("ItemGroup"), _) if !inside_target(stack) => {
            let split = |value: Option<String>| value.map(|v| split_item_list(&v)).unwrap_or_default();
            document.items.push(ProjectItem {
                item_type: name.to_string(),
                include: split(attribute(element, "Include")?),
                remove: split(attribute(element, "Remove")?),
                exclude: split(attribute(element, "Exclude")?),
            });
        }
        _ => {}
    }
    Ok(())
}

/// The resolved source files of a project manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    pub manifest_path: PathBuf,
    pub mode: ResolutionMode,
    /// Source files, deduplicated ignoring case: the directory scan in sorted
    /// order, then explicit inclusions in declaration order.
    pub source_files: Vec<PathBuf>,
    /// Referenced project manifests, resolved against the manifest directory.
    pub project_references: Vec<PathBuf>,
    pub target_frameworks: Vec<String>,
    pub sdk: Option<String>,
}

/// Ordered set of paths deduplicated case-insensitively; the first
/// occurrence wins.
#[derive(Debug, Default)]
struct PathSet {
    paths: Vec<PathBuf>,
    keys: HashSet<String>,
}

impl PathSet {
    fn insert(&mut self, path: PathBuf) -> bool {
        if self.keys.insert(comparable(&path)) {
            self.paths.push(path);
            true
        } else {
            false
        }
    }

    fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        let keys = &mut self.keys;
        self.paths.retain(|path| {
            let kept = keep(path);
            if !kept {
                keys.remove(&comparable(path));
            }
            kept
        });
    }

    fn into_vec(self) -> Vec<PathBuf> {
        self.paths
    }
}

/// Resolves project manifests against a filesystem.
pub struct ProjectManifestParser<F: ?Sized> {
    fs: Arc<F>,
    registry: Arc<AnalyzerRegistry>,
    options: DiscoveryOptions,
}

impl<F: FileSystem + ?Sized> ProjectManifestParser<F> {
    /// Creates a parser. [`DEFAULT_EXCLUDED_DIRS`] are added to the
    /// exclusions in `options`.
    pub fn new(fs: Arc<F>, registry: Arc<AnalyzerRegistry>, options: DiscoveryOptions) -> Self {
        let mut options = options;
        for dir in DEFAULT_EXCLUDED_DIRS {
            if !options.is_excluded_dir(dir) {
                options.excluded_dirs.push((*dir).to_string());
            }
        }
        Self {
            fs,
            registry,
            options,
        }
    }

    pub fn discovery_options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Resolves the source files of `manifest_path`.
    ///
    /// # Errors
    ///
    /// Fails only when the manifest cannot be read. A document that cannot
    /// be parsed degrades to a directory scan instead.
    pub async fn resolve(&self, manifest_path: &Path) -> Result<ResolvedManifest> {
        let manifest_path = self
            .fs
            .normalize_path(manifest_path)
            .await
            .map_err(|e| Error::read(manifest_path, e))?;
        let text = self
            .fs
            .read_to_string(&manifest_path)
            .await
            .map_err(|e| Error::read(&manifest_path, e))?;
        let manifest_dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let document = match parse_project_document(&text) {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    manifest = %manifest_path.display(),
                    error = %e,
                    "Manifest could not be parsed, falling back to directory scan"
                );
                let source_files = self.scan(&manifest_dir).await?;
                return Ok(ResolvedManifest {
                    manifest_path,
                    mode: ResolutionMode::Fallback,
                    source_files,
                    project_references: Vec::new(),
                    target_frameworks: Vec::new(),
                    sdk: None,
                });
            }
        };

        let (mode, source_files) = match document.dialect {
            ProjectDialect::Sdk => (
                ResolutionMode::Sdk,
                self.resolve_sdk(&document, &manifest_dir).await?,
            ),
            ProjectDialect::Legacy => (
                ResolutionMode::Legacy,
                self.resolve_legacy(&document, &manifest_dir).await?,
            ),
        };

        debug!(
            manifest = %manifest_path.display(),
            mode = %mode,
            files = source_files.len(),
            "Resolved project manifest"
        );

        Ok(ResolvedManifest {
            project_references: document
                .project_references()
                .map(|reference| normalize_lexically(&manifest_dir.join(reference)))
                .collect(),
            target_frameworks: document.target_frameworks(),
            sdk: document.sdk.clone(),
            manifest_path,
            mode,
            source_files,
        })
    }

    async fn resolve_sdk(&self, document: &ProjectDocument, manifest_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = PathSet::default();
        if document.default_items_enabled() {
            for path in self.scan(manifest_dir).await? {
                files.insert(path);
            }
        } else {
            debug!(dir = %manifest_dir.display(), "Default items disabled, skipping directory scan");
        }

        let removals = self.remove_patterns(document, manifest_dir)?;
        files.retain(|path| !removals.iter().any(|pattern| pattern.matches(path)));

        self.add_includes(document, manifest_dir, &mut files).await?;
        Ok(files.into_vec())
    }

    async fn resolve_legacy(&self, document: &ProjectDocument, manifest_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = PathSet::default();
        self.add_includes(document, manifest_dir, &mut files).await?;

        let removals = self.remove_patterns(document, manifest_dir)?;
        files.retain(|path| !removals.iter().any(|pattern| pattern.matches(path)));
        Ok(files.into_vec())
    }

    fn remove_patterns(&self, document: &ProjectDocument, manifest_dir: &Path) -> Result<Vec<ItemPattern>> {
        document
            .source_items()
            .flat_map(|item| item.remove.iter())
            .map(|pattern| ItemPattern::new(pattern, manifest_dir))
            .collect()
    }

    /// Adds explicit `Include` entries of source items, minus each item's
    /// own `Exclude` entries. Only existing files claimed by an analyzer are
    /// kept.
    async fn add_includes(
        &self,
        document: &ProjectDocument,
        manifest_dir: &Path,
        files: &mut PathSet,
    ) -> Result<()> {
        let extensions = self.registry.supported_file_extensions();
        let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();

        for item in document.source_items() {
            let excludes = item
                .exclude
                .iter()
                .map(|pattern| ItemPattern::new(pattern, manifest_dir))
                .collect::<Result<Vec<_>>>()?;

            for include in &item.include {
                let pattern = ItemPattern::new(include, manifest_dir)?;
                let matches = pattern
                    .expand(self.fs.as_ref(), &extensions, &self.options)
                    .await
                    .map_err(|e| Error::read(pattern.base(), e))?;
                for path in matches {
                    if !self.registry.is_file_supported(&path) {
                        continue;
                    }
                    if excludes.iter().any(|exclude| exclude.matches(&path)) {
                        continue;
                    }
                    files.insert(path);
                }
            }
        }
        Ok(())
    }

    /// Every analyzer-claimed file below `dir`, excluding conventional
    /// build-output, dependency and tooling directories.
    pub async fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let extensions = self.registry.supported_file_extensions();
        let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
        let discovered = self
            .fs
            .discover_files(dir, &extensions, &self.options)
            .await
            .map_err(|e| Error::read(dir, e))?;
        Ok(discovered.into_iter().collect())
    }
}

impl<F: ?Sized> fmt::Debug for ProjectManifestParser<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectManifestParser")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_attribute_selects_sdk_dialect() {
        let doc = parse_project_document(
            r#"<Project Sdk="Microsoft.NET.Sdk">
                 <PropertyGroup>
                   <TargetFramework>net8.0</TargetFramework>
                   <AssemblyName>App</AssemblyName>
                 </PropertyGroup>
               </Project>"#,
        )
        .unwrap();
        assert_eq!(doc.dialect, ProjectDialect::Sdk);
        assert_eq!(doc.sdk.as_deref(), Some("Microsoft.NET.Sdk"));
        assert_eq!(doc.property("assemblyname"), Some("App"));
        assert_eq!(doc.target_frameworks(), vec!["net8.0".to_string()]);
        assert!(doc.default_items_enabled());
    }

    #[test]
    fn test_sdk_element_and_import_select_sdk_dialect() {
        let element = parse_project_document(
            r#"<Project><Sdk Name="Microsoft.NET.Sdk" /></Project>"#,
        )
        .unwrap();
        assert_eq!(element.dialect, ProjectDialect::Sdk);

        let import = parse_project_document(
            r#"<Project><Import Project="Sdk.props" Sdk="Microsoft.NET.Sdk" /></Project>"#,
        )
        .unwrap();
        assert_eq!(import.dialect, ProjectDialect::Sdk);
    }

    #[test]
    fn test_legacy_items_are_collected() {
        let doc = parse_project_document(
            r#"<?xml version="1.0" encoding="utf-8"?>
               <Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
                 <ItemGroup>
                   <Compile Include="Program.cs" />
                   <Compile Include="Properties\AssemblyInfo.cs;Util.cs" />
                   <None Include="App.config" />
                   <ProjectReference Include="..\Lib\Lib.csproj">
                     <Project>{GUID}</Project>
                   </ProjectReference>
                 </ItemGroup>
                 <Target Name="Build">
                   <ItemGroup><Compile Include="Ignored.cs" /></ItemGroup>
                 </Target>
               </Project>"#,
        )
        .unwrap();
        assert_eq!(doc.dialect, ProjectDialect::Legacy);
        let includes: Vec<&String> = doc.source_items().flat_map(|i| i.include.iter()).collect();
        assert_eq!(includes, vec!["Program.cs", "Properties/AssemblyInfo.cs", "Util.cs"]);
        assert_eq!(doc.project_references().collect::<Vec<_>>(), vec!["../Lib/Lib.csproj"]);
    }

    #[test]
    fn test_disabled_default_items() {
        let doc = parse_project_document(
            r#"<Project Sdk="Microsoft.NET.Sdk">
                 <PropertyGroup><EnableDefaultCompileItems> False </EnableDefaultCompileItems></PropertyGroup>
               </Project>"#,
        )
        .unwrap();
        assert!(!doc.default_items_enabled());
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        assert!(parse_project_document("<Project><ItemGroup></Project>").is_err());
        assert!(parse_project_document("<Solution />").is_err());
        assert!(parse_project_document("not xml at all").is_err());
        assert!(parse_project_document("<Project>").is_err());
        assert!(parse_project_document("").is_err());
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let doc = parse_project_document("\u{feff}<Project Sdk=\"X\" />").unwrap();
        assert_eq!(doc.dialect, ProjectDialect::Sdk);
    }
}
