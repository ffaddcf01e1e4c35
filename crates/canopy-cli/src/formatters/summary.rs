//! Human-readable summary: node and error counts plus every error node.

use super::Formatter;
use anyhow::Result;
use canopy_core::{AnalysisEnvelope, AnalysisResult};
use canopy_processor::{BATCH_TYPE, DIRECTORY_TYPE, PROJECT_TYPE, SOLUTION_TYPE};
use colored::Colorize;
use std::fmt::Write;

pub struct SummaryFormatter;

impl Formatter for SummaryFormatter {
    fn render(&self, envelope: &AnalysisEnvelope) -> Result<String> {
        let root = &envelope.root_node;
        let errors = root.error_nodes();
        let mut out = String::new();

        writeln!(out, "{}", "Canopy Analysis Summary".bold())?;
        writeln!(out, "=======================\n")?;
        writeln!(out, "Source:    {}", envelope.source_identifier)?;
        writeln!(out, "Root:      {} ({})", root.type_tag, root.kind_tag)?;
        writeln!(
            out,
            "Generated: {}",
            envelope.generated_at_utc.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(out, "Nodes:     {}", root.node_count())?;
        let error_line = format!("Errors:    {}", errors.len());
        if errors.is_empty() {
            writeln!(out, "{}", error_line.green())?;
        } else {
            writeln!(out, "{}", error_line.red())?;
        }

        if is_aggregate(root) {
            writeln!(out, "\nInputs ({}):", root.children.len())?;
            for child in &root.children {
                write_input(&mut out, child)?;
            }
        }

        if !errors.is_empty() {
            writeln!(out, "\nErrors ({}):", errors.len())?;
            for node in errors {
                let path = node.attribute_str("path").unwrap_or(node.location.path.as_str());
                let kind = node.attribute_str("errorKind").unwrap_or("Unknown");
                let message = node.attribute_str("message").unwrap_or(node.source_text.as_str());
                writeln!(out, "  {} {}: [{}] {}", "✗".red(), path, kind.yellow(), message)?;
            }
        }

        Ok(out)
    }
}

fn is_aggregate(node: &AnalysisResult) -> bool {
    [PROJECT_TYPE, SOLUTION_TYPE, DIRECTORY_TYPE, BATCH_TYPE].contains(&node.type_tag.as_str())
}

fn write_input(out: &mut String, child: &AnalysisResult) -> std::fmt::Result {
    let errors = child.error_nodes().len();
    let marker = if errors == 0 { "✓".green() } else { "✗".red() };
    write!(
        out,
        "  {} {} ({}, {} nodes",
        marker,
        child.location.path,
        child.type_tag,
        child.node_count()
    )?;
    if errors > 0 {
        write!(out, ", {} errors", errors)?;
    }
    writeln!(out, ")")
}
