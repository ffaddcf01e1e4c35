//! C# analyzer.

use crate::attributes::csharp_attribute_table;
use crate::parser::CSharpSyntaxParser;
use canopy_core::{
    AnalysisResult, Analyzer, AnalyzerCapability, NormalizeOptions, Result, SyntaxAnalyzer,
};
use std::path::Path;
use tracing::{debug, warn};

pub const ANALYZER_NAME: &str = "csharp";
pub const FILE_EXTENSIONS: &[&str] = &[".cs", ".csx"];
pub const PROJECT_EXTENSIONS: &[&str] = &[".csproj"];

/// Analyzer for C# source files and `.csproj` projects.
#[derive(Debug)]
pub struct CSharpAnalyzer {
    inner: SyntaxAnalyzer<CSharpSyntaxParser>,
}

impl CSharpAnalyzer {
    pub fn new() -> Self {
        Self::with_parser(CSharpSyntaxParser::new())
    }

    /// Analyzer that reports files containing syntax errors as parse failures.
    pub fn strict() -> Self {
        Self::with_parser(CSharpSyntaxParser::strict())
    }

    fn with_parser(parser: CSharpSyntaxParser) -> Self {
        Self {
            inner: SyntaxAnalyzer::new(
                AnalyzerCapability::new(
                    ANALYZER_NAME,
                    FILE_EXTENSIONS.iter().copied(),
                    PROJECT_EXTENSIONS.iter().copied(),
                ),
                parser,
                csharp_attribute_table(),
            ),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.inner.parser().rejects_syntax_errors()
    }
}

impl Default for CSharpAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for CSharpAnalyzer {
    fn capability(&self) -> &AnalyzerCapability {
        self.inner.capability()
    }

    fn analyze(
        &self,
        source: &str,
        path: &Path,
        options: &NormalizeOptions,
    ) -> Result<AnalysisResult> {
        debug!("Analyzing {} ({} bytes)", path.display(), source.len());
        let result = self.inner.analyze(source, path, options)?;
        if result.attributes.contains_key("containsDiagnostics") {
            warn!("{} contains syntax errors", path.display());
        }
        Ok(result)
    }
}
