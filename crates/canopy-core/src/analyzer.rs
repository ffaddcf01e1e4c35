//! Analyzer trait.

use crate::capability::AnalyzerCapability;
use crate::error::Result;
use crate::node::AnalysisResult;
use crate::normalize::{AttributeTable, NormalizeOptions, Normalizer};
use crate::syntax::SyntaxParser;
use std::fmt;
use std::path::Path;

/// A capability unit translating one language's parse output into the
/// generic node model.
///
/// # Thread Safety
///
/// Implementations must be Send + Sync: a single analyzer instance serves
/// every concurrent worker.
pub trait Analyzer: Send + Sync + fmt::Debug {
    /// Extensions this analyzer owns.
    fn capability(&self) -> &AnalyzerCapability;

    /// Analyzer name (defaults to the capability name).
    fn name(&self) -> &str {
        self.capability().name()
    }

    /// Parses `source` (read from `path`) and normalizes the result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] when the source cannot be parsed.
    fn analyze(&self, source: &str, path: &Path, options: &NormalizeOptions)
        -> Result<AnalysisResult>;
}

/// An [`Analyzer`] composed of a capability, a syntax-parsing service and an
/// attribute dispatch table.
#[derive(Debug)]
pub struct SyntaxAnalyzer<P> {
    capability: AnalyzerCapability,
    parser: P,
    attributes: AttributeTable,
}

impl<P: SyntaxParser> SyntaxAnalyzer<P> {
    pub fn new(capability: AnalyzerCapability, parser: P, attributes: AttributeTable) -> Self {
        Self {
            capability,
            parser,
            attributes,
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }
}

impl<P: SyntaxParser> Analyzer for SyntaxAnalyzer<P> {
    fn capability(&self) -> &AnalyzerCapability {
        &self.capability
    }

    fn analyze(
        &self,
        source: &str,
        path: &Path,
        options: &NormalizeOptions,
    ) -> Result<AnalysisResult> {
        let tree = self.parser.parse(source, path)?;
        Ok(Normalizer::new(&self.attributes, source, *options).normalize(&tree))
    }
}
