//! Solution manifest resolution.
//!
//! Two solution formats are understood: the line-oriented `.sln` format and
//! the XML `.slnx` format.

use crate::error::{Error, Result};
use canopy_core::capability::extension_of;
use canopy_core::AnalyzerRegistry;
use canopy_fs::{normalize_lexically, FileSystem};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Extensions recognized as solution manifests.
pub const SOLUTION_EXTENSIONS: &[&str] = &[".sln", ".slnx"];

/// Project type GUID of solution folders.
pub const SOLUTION_FOLDER_TYPE_GUID: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

/// Whether `path` names a solution manifest.
pub fn is_solution_path(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SOLUTION_EXTENSIONS.contains(&ext.as_str()))
}

/// Kind of a solution entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Project,
    /// Virtual grouping folder; never processable.
    Folder,
}

/// A project declaration as written in the solution file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDeclaration {
    pub kind: DeclarationKind,
    pub type_guid: String,
    pub name: String,
    /// Path relative to the solution directory, with `/` separators.
    pub relative_path: String,
    pub project_guid: String,
}

/// Parsed contents of a solution file, before touching the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolutionText {
    pub format_version: Option<String>,
    pub tool_version: Option<String>,
    pub minimum_tool_version: Option<String>,
    pub declarations: Vec<ProjectDeclaration>,
}

fn project_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^Project\(\s*"\{(?P<type>[0-9A-Fa-f-]+)\}"\s*\)\s*=\s*"(?P<name>[^"]*)"\s*,\s*"(?P<path>[^"]*)"\s*,\s*"\{(?P<guid>[0-9A-Fa-f-]+)\}"\s*$"#,
        )
        .expect("project line regex is valid")
    })
}

const FORMAT_HEADER: &str = "Microsoft Visual Studio Solution File, Format Version";

fn version_line(line: &str, key: &str) -> Option<String> {
    let (name, value) = line.split_once('=')?;
    if name.trim() == key {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    } else {
        None
    }
}

/// Parses the line-oriented solution format.
///
/// Malformed project declarations are skipped. Missing header lines leave
/// the version fields empty.
pub fn parse_solution_text(text: &str) -> SolutionText {
    let mut solution = SolutionText::default();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim().trim_start_matches('\u{feff}');

        if line.starts_with("Project(") {
            match project_line_regex().captures(line) {
                Some(caps) => {
                    let type_guid = caps["type"].to_ascii_uppercase();
                    let kind = if type_guid == SOLUTION_FOLDER_TYPE_GUID {
                        DeclarationKind::Folder
                    } else {
                        DeclarationKind::Project
                    };
                    solution.declarations.push(ProjectDeclaration {
                        kind,
                        type_guid,
                        name: caps["name"].to_string(),
                        relative_path: caps["path"].replace('\\', "/"),
                        project_guid: caps["guid"].to_ascii_uppercase(),
                    });
                }
                None => debug!(line = index + 1, "Skipping malformed project declaration"),
            }
        } else if let Some(version) = line.strip_prefix(FORMAT_HEADER) {
            solution.format_version = Some(version.trim().to_string()).filter(|v| !v.is_empty());
        } else if let Some(version) = version_line(line, "VisualStudioVersion") {
            solution.tool_version = Some(version);
        } else if let Some(version) = version_line(line, "MinimumVisualStudioVersion") {
            solution.minimum_tool_version = Some(version);
        }
    }

    solution
}

fn slnx_attribute(element: &BytesStart<'_>, wanted: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == wanted.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn slnx_element(solution: &mut SolutionText, element: &BytesStart<'_>, depth: usize) -> Result<()> {
    let name = element.local_name();
    match name.as_ref() {
        b"Solution" if depth == 0 => {}
        _ if depth == 0 => {
            return Err(Error::InvalidDocument(format!(
                "expected <Solution> root, found <{}>",
                String::from_utf8_lossy(name.as_ref())
            )));
        }
        b"Project" => {
            let Some(path) = slnx_attribute(element, "Path")? else {
                return Err(Error::InvalidDocument("<Project> without Path".to_string()));
            };
            let relative_path = path.replace('\\', "/");
            let name = Path::new(&relative_path)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            solution.declarations.push(ProjectDeclaration {
                kind: DeclarationKind::Project,
                type_guid: slnx_attribute(element, "Type")?.unwrap_or_default(),
                name,
                relative_path,
                project_guid: slnx_attribute(element, "Id")?.unwrap_or_default(),
            });
        }
        b"Folder" => {
            let name = slnx_attribute(element, "Name")?.unwrap_or_default();
            solution.declarations.push(ProjectDeclaration {
                kind: DeclarationKind::Folder,
                type_guid: SOLUTION_FOLDER_TYPE_GUID.to_string(),
                name: name.trim_matches('/').to_string(),
                relative_path: name,
                project_guid: String::new(),
            });
        }
        _ => {}
    }
    Ok(())
}

/// Parses the XML solution format.
///
/// Unlike the line format, malformed XML is an error.
pub fn parse_slnx_document(text: &str) -> Result<SolutionText> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut solution = SolutionText {
        format_version: Some("slnx".to_string()),
        ..SolutionText::default()
    };
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                saw_root |= depth == 0;
                slnx_element(&mut solution, &element, depth)?;
                depth += 1;
            }
            Event::Empty(element) => {
                saw_root |= depth == 0;
                slnx_element(&mut solution, &element, depth)?;
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::InvalidDocument("unbalanced end tag".to_string()))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root || depth != 0 {
        return Err(Error::InvalidDocument("incomplete <Solution> document".to_string()));
    }
    Ok(solution)
}

/// A declared solution entry resolved against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredProject {
    pub name: String,
    pub kind: DeclarationKind,
    pub type_guid: String,
    pub project_guid: String,
    pub relative_path: String,
    /// Absolute, lexically normalized path.
    pub path: PathBuf,
    pub exists: bool,
    /// Whether a registered analyzer recognizes the project extension.
    pub supported: bool,
}

impl DeclaredProject {
    /// Whether this entry is part of the processable set.
    pub fn is_processable(&self) -> bool {
        self.kind == DeclarationKind::Project && self.exists && self.supported
    }
}

/// A resolved solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub format_version: Option<String>,
    pub tool_version: Option<String>,
    pub minimum_tool_version: Option<String>,
    declared: Vec<DeclaredProject>,
}

impl SolutionDescriptor {
    /// Processable project manifests in declaration order: the file exists
    /// and its extension is a recognized project extension.
    pub fn project_paths(&self) -> Vec<&Path> {
        self.declared
            .iter()
            .filter(|project| project.is_processable())
            .map(|project| project.path.as_path())
            .collect()
    }

    /// Every declaration, including folders, missing and unsupported
    /// projects.
    pub fn all_declared_projects(&self) -> &[DeclaredProject] {
        &self.declared
    }

    /// Existing projects of a type no analyzer recognizes.
    pub fn unsupported_projects(&self) -> Vec<&DeclaredProject> {
        self.declared
            .iter()
            .filter(|p| p.kind == DeclarationKind::Project && p.exists && !p.supported)
            .collect()
    }

    /// Declared projects whose file does not exist.
    pub fn missing_projects(&self) -> Vec<&DeclaredProject> {
        self.declared
            .iter()
            .filter(|p| p.kind == DeclarationKind::Project && !p.exists)
            .collect()
    }
}

/// Resolves solution manifests against a filesystem.
pub struct SolutionManifestParser<F: ?Sized> {
    fs: Arc<F>,
    registry: Arc<AnalyzerRegistry>,
}

impl<F: FileSystem + ?Sized> SolutionManifestParser<F> {
    pub fn new(fs: Arc<F>, registry: Arc<AnalyzerRegistry>) -> Self {
        Self { fs, registry }
    }

    /// Reads and resolves a solution manifest.
    ///
    /// # Errors
    ///
    /// An unreadable or non-UTF-8 solution file, or a malformed `.slnx`
    /// document, is an error; there is no fallback for solutions.
    pub async fn resolve(&self, solution_path: &Path) -> Result<SolutionDescriptor> {
        let path = self
            .fs
            .normalize_path(solution_path)
            .await
            .map_err(|e| Error::read(solution_path, e))?;
        let text = self
            .fs
            .read_to_string(&path)
            .await
            .map_err(|e| Error::read(&path, e))?;

        let is_xml = extension_of(&path).as_deref() == Some(".slnx");
        let parsed = if is_xml {
            parse_slnx_document(&text)?
        } else {
            parse_solution_text(&text)
        };

        let solution_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut declared = Vec::with_capacity(parsed.declarations.len());
        for declaration in parsed.declarations {
            declared.push(self.resolve_declaration(&solution_dir, declaration).await);
        }

        for project in &declared {
            if project.kind != DeclarationKind::Project || project.is_processable() {
                continue;
            }
            if !project.exists {
                warn!(project = %project.path.display(), "Solution references a missing project");
            } else {
                warn!(project = %project.path.display(), "Skipping unsupported project type");
            }
        }

        Ok(SolutionDescriptor {
            name: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            format_version: parsed.format_version,
            tool_version: parsed.tool_version,
            minimum_tool_version: parsed.minimum_tool_version,
            path,
            declared,
        })
    }

    async fn resolve_declaration(&self, solution_dir: &Path, declaration: ProjectDeclaration) -> DeclaredProject {
        let (path, exists, supported) = match declaration.kind {
            DeclarationKind::Folder => (solution_dir.to_path_buf(), false, false),
            DeclarationKind::Project => {
                let path = normalize_lexically(&solution_dir.join(&declaration.relative_path));
                let exists = self
                    .fs
                    .metadata(&path)
                    .await
                    .map(|meta| meta.is_file)
                    .unwrap_or(false);
                let supported = self.registry.is_project_supported(&path);
                (path, exists, supported)
            }
        };
        DeclaredProject {
            name: declaration.name,
            kind: declaration.kind,
            type_guid: declaration.type_guid,
            project_guid: declaration.project_guid,
            relative_path: declaration.relative_path,
            path,
            exists,
            supported,
        }
    }
}

impl<F: ?Sized> fmt::Debug for SolutionManifestParser<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolutionManifestParser")
            .field("registry", &self.registry)
            .finish()
    }
}
