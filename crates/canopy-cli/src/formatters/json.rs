//! JSON formatter for analysis envelopes.

use super::Formatter;
use anyhow::{Context, Result};
use canopy_core::AnalysisEnvelope;

pub struct JsonFormatter {
    pub pretty: bool,
}

impl Formatter for JsonFormatter {
    fn render(&self, envelope: &AnalysisEnvelope) -> Result<String> {
        let mut json = if self.pretty {
            serde_json::to_string_pretty(envelope)
        } else {
            serde_json::to_string(envelope)
        }
        .context("Failed to serialize analysis result")?;
        json.push('\n');
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::AnalysisResult;

    fn envelope() -> AnalysisEnvelope {
        let mut root = AnalysisResult::new("CompilationUnit", "compilation_unit");
        root.children.push(AnalysisResult::new("ClassDeclaration", "class_declaration"));
        AnalysisEnvelope::new("Program.cs", root)
    }

    #[test]
    fn test_compact_is_single_line() {
        let json = JsonFormatter { pretty: false }.render(&envelope()).unwrap();
        assert_eq!(json.lines().count(), 1);
        assert!(json.starts_with("{\"sourceIdentifier\":\"Program.cs\""));
    }

    #[test]
    fn test_pretty_round_trips() {
        let original = envelope();
        let json = JsonFormatter { pretty: true }.render(&original).unwrap();
        assert!(json.lines().count() > 1);

        let parsed: AnalysisEnvelope = serde_json::from_str(&json).unwrap();
        assert!(parsed.structurally_eq(&original));
    }
}
