//! C# support for canopy.
//!
//! Parses `.cs`/`.csx` files with tree-sitter and claims `.csproj`
//! projects. Use [`default_registry`] for a shared registry holding this
//! analyzer, or [`registry`] to build one with explicit settings.

mod analyzer;
mod attributes;
mod parser;

pub use analyzer::{CSharpAnalyzer, ANALYZER_NAME, FILE_EXTENSIONS, PROJECT_EXTENSIONS};
pub use attributes::csharp_attribute_table;
pub use parser::{pascal_case, CSharpSyntaxParser};

use canopy_core::{Analyzer, AnalyzerRegistry};
use std::sync::{Arc, OnceLock};

/// Process-wide registry with the lenient C# analyzer, built on first use.
pub fn default_registry() -> Arc<AnalyzerRegistry> {
    static REGISTRY: OnceLock<Arc<AnalyzerRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Arc::new(registry(false)))
        .clone()
}

/// Builds a registry holding the C# analyzer. The analyzer itself is
/// constructed lazily on the first lookup.
pub fn registry(reject_syntax_errors: bool) -> AnalyzerRegistry {
    AnalyzerRegistry::lazy(move || {
        let analyzer: Arc<dyn Analyzer> = if reject_syntax_errors {
            Arc::new(CSharpAnalyzer::strict())
        } else {
            Arc::new(CSharpAnalyzer::new())
        };
        vec![analyzer]
    })
}
