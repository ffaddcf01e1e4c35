//! Canopy Core - analyzer abstraction and the generic AST node model.
//!
//! This crate provides the foundational types and traits for Canopy's
//! multi-language analysis pipeline. It defines:
//!
//! - [`AnalyzerCapability`]: Which file and project extensions an analyzer owns
//! - [`Analyzer`] and [`AnalyzerRegistry`]: Routing paths to analyzers
//! - [`SyntaxParser`] and [`SyntaxNode`]: The syntax-parsing service contract
//! - [`AnalysisResult`] and [`AnalysisEnvelope`]: The serializable output tree
//! - [`Normalizer`] and [`AttributeTable`]: Syntax tree to output tree conversion
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   canopy-cli     │  (User interface)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ canopy-processor │ ──▶ │ canopy-manifest  │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   canopy-core    │  (This crate - analyzer abstraction)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌───────────────────────┐
//! │ canopy-backend-csharp │  (tree-sitter C#)
//! └───────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use canopy_core::{AnalyzerRegistry, NormalizeOptions};
//! use std::path::Path;
//!
//! let registry = AnalyzerRegistry::new(Vec::new());
//! // Register analyzers here
//!
//! if let Some(analyzer) = registry.analyzer_for_file(Path::new("src/Program.cs")) {
//!     let result = analyzer.analyze("class A {}", Path::new("src/Program.cs"), &NormalizeOptions::default())?;
//!     println!("{} nodes", result.node_count());
//! }
//! # Ok::<(), canopy_core::Error>(())
//! ```

pub mod analyzer;
pub mod cancel;
pub mod capability;
pub mod error;
pub mod node;
pub mod normalize;
pub mod registry;
pub mod syntax;

// Re-export core types for convenience
pub use analyzer::{Analyzer, SyntaxAnalyzer};
pub use cancel::CancellationToken;
pub use capability::{extension_of, normalize_extension, AnalyzerCapability};
pub use error::{Error, Result};
pub use node::{
    AnalysisEnvelope, AnalysisResult, Attributes, SourceLocation, TextSpan, ERROR_NODE_TYPE,
};
pub use normalize::{AttributeExtractor, AttributeTable, NormalizeOptions, Normalizer};
pub use registry::AnalyzerRegistry;
pub use syntax::{SyntaxNode, SyntaxParser, DEFAULT_MAX_TREE_DEPTH};
