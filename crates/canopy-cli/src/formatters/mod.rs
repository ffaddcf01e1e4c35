//! Output formatters for analysis envelopes.

pub mod json;
pub mod summary;

pub use json::JsonFormatter;
pub use summary::SummaryFormatter;

use crate::OutputFormat;
use anyhow::Result;
use canopy_core::AnalysisEnvelope;

/// Trait for rendering an analysis envelope
pub trait Formatter {
    /// Render the envelope, including a trailing newline
    fn render(&self, envelope: &AnalysisEnvelope) -> Result<String>;
}

pub fn render(format: OutputFormat, envelope: &AnalysisEnvelope, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Json => JsonFormatter { pretty }.render(envelope),
        OutputFormat::Summary => SummaryFormatter.render(envelope),
    }
}
