//! Canopy Manifest - project and solution manifest resolution.
//!
//! - [`ProjectManifestParser`] resolves the source files that belong to a
//!   project manifest (SDK-style implicit inclusion or legacy item lists).
//! - [`SolutionManifestParser`] resolves the projects declared by a
//!   solution (`.sln` or `.slnx`).
//!
//! The document parsers ([`parse_project_document`], [`parse_solution_text`],
//! [`parse_slnx_document`]) are pure; the resolvers consult a
//! [`canopy_fs::FileSystem`] and an [`canopy_core::AnalyzerRegistry`].

pub mod error;
pub mod glob;
pub mod project;
pub mod solution;

pub use error::{Error, Result};
pub use glob::{split_item_list, ItemPattern};
pub use project::{
    parse_project_document, ProjectDialect, ProjectDocument, ProjectItem, ProjectManifestParser,
    ResolutionMode, ResolvedManifest, DEFAULT_EXCLUDED_DIRS, SOURCE_ITEM_TYPES,
};
pub use solution::{
    is_solution_path, parse_slnx_document, parse_solution_text, DeclarationKind, DeclaredProject,
    ProjectDeclaration, SolutionDescriptor, SolutionManifestParser, SolutionText,
    SOLUTION_EXTENSIONS,
};
