//! Contract of the external syntax-parsing service.
//!
//! A parser turns source text into an owned [`SyntaxNode`] tree: type tag,
//! kind tag, span, location and child nodes. Any implementation can be
//! plugged in behind [`SyntaxParser`] without touching the processor.

use crate::error::Result;
use crate::node::{SourceLocation, TextSpan};
use std::fmt;
use std::path::Path;

/// Deepest tree a parser hands to the normalizer. Deeper inputs (long
/// generated expression chains) are reported as parse failures.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 1024;

/// A node as reported by a syntax-parsing service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxNode {
    pub type_tag: String,
    pub kind_tag: String,
    /// Role of this node within its parent (e.g. "name", "body").
    pub field: Option<String>,
    pub span: TextSpan,
    pub location: SourceLocation,
    /// True when this node or a descendant contains a syntax error.
    pub has_error: bool,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// Child nodes in document order.
    pub fn child_nodes(&self) -> &[SyntaxNode] {
        &self.children
    }

    /// First child with the given field role.
    pub fn child_by_field(&self, field: &str) -> Option<&SyntaxNode> {
        self.children
            .iter()
            .find(|child| child.field.as_deref() == Some(field))
    }

    /// Children whose kind tag matches.
    pub fn children_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a SyntaxNode> + 'a {
        self.children.iter().filter(move |child| child.kind_tag == kind)
    }

    /// First child whose kind tag is one of `kinds`.
    pub fn first_child_of_kinds(&self, kinds: &[&str]) -> Option<&SyntaxNode> {
        self.children
            .iter()
            .find(|child| kinds.contains(&child.kind_tag.as_str()))
    }

    /// Source text covered by this node. Returns an empty string when the
    /// span does not fall on char boundaries of `source`.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.span.start..self.span.end).unwrap_or("")
    }

    /// Number of nodes in this subtree, including this one.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// The syntax-parsing service consumed by analyzers.
pub trait SyntaxParser: Send + Sync + fmt::Debug {
    /// Parses `source` (read from `path`) into a syntax tree.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] when the service rejects the input.
    fn parse(&self, source: &str, path: &Path) -> Result<SyntaxNode>;
}
