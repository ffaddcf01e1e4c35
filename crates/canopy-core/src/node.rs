//! Generic AST node model shared by every analyzer.
//!
//! Every analyzer's output is normalized into [`AnalysisResult`] trees, and
//! every processed file, project or solution is wrapped in an
//! [`AnalysisEnvelope`]. Field names are serialized in camelCase and are
//! stable so external writers can round-trip envelopes.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Ordered attribute map attached to a node.
pub type Attributes = serde_json::Map<String, Value>;

/// Type tag used for synthetic error nodes.
pub const ERROR_NODE_TYPE: &str = "ErrorNode";

/// Kind tag used for synthetic error nodes.
pub const ERROR_NODE_KIND: &str = "Error";

/// Byte span of a node in its source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub length: usize,
}

impl TextSpan {
    /// Creates a span from start and end offsets; `end` is clamped to be at
    /// least `start`.
    pub fn new(start: usize, end: usize) -> Self {
        let end = end.max(start);
        Self {
            start,
            end,
            length: end - start,
        }
    }
}

/// Line/column location of a node. Lines and columns are zero-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub path: String,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    /// True when the position was remapped (e.g. by a line directive).
    pub has_mapped_path: bool,
}

impl SourceLocation {
    /// Location that only names a path.
    pub fn for_path(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            ..Self::default()
        }
    }
}

/// A node of the generic AST.
///
/// `children` are always in source-document order, whatever order they were
/// computed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub type_tag: String,
    pub kind_tag: String,
    pub source_text: String,
    pub span: TextSpan,
    pub location: SourceLocation,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub children: Vec<AnalysisResult>,
}

impl AnalysisResult {
    /// Creates an empty node with the given tags.
    pub fn new(type_tag: impl Into<String>, kind_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            kind_tag: kind_tag.into(),
            ..Self::default()
        }
    }

    /// Builds the synthetic node substituted for a file or project that
    /// failed to process.
    pub fn error(path: &Path, error_kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut node = Self::new(ERROR_NODE_TYPE, ERROR_NODE_KIND);
        node.location = SourceLocation::for_path(path);
        node.attributes
            .insert("path".to_string(), Value::String(path.display().to_string()));
        node.attributes
            .insert("errorKind".to_string(), Value::String(error_kind.to_string()));
        node.attributes
            .insert("message".to_string(), Value::String(message.clone()));
        node.source_text = message;
        node
    }

    /// Builds an error node from a core error.
    pub fn from_error(path: &Path, error: &Error) -> Self {
        Self::error(path, error.kind_name(), error.to_string())
    }

    /// Whether this node is a synthetic error node.
    pub fn is_error(&self) -> bool {
        self.type_tag == ERROR_NODE_TYPE
    }

    /// Adds an attribute, returning the node for chaining.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Looks up an attribute as a string.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Total number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        self.descendants().count()
    }

    /// Depth-first iterator over this subtree.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// All synthetic error nodes in this subtree, depth-first.
    pub fn error_nodes(&self) -> Vec<&AnalysisResult> {
        self.descendants().filter(|node| node.is_error()).collect()
    }
}

/// Depth-first pre-order traversal of an [`AnalysisResult`] tree.
pub struct Descendants<'a> {
    stack: Vec<&'a AnalysisResult>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a AnalysisResult;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Top-level wrapper pairing a source identifier and timestamp with a root node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEnvelope {
    pub source_identifier: String,
    pub generated_at_utc: DateTime<Utc>,
    pub root_node: AnalysisResult,
}

impl AnalysisEnvelope {
    /// Wraps a root node, stamping the current time.
    pub fn new(source_identifier: impl Into<String>, root_node: AnalysisResult) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            generated_at_utc: Utc::now(),
            root_node,
        }
    }

    /// Envelope whose root is a synthetic error node.
    pub fn error(path: &Path, error: &Error) -> Self {
        Self::new(path.display().to_string(), AnalysisResult::from_error(path, error))
    }

    /// Structural equality, ignoring the generation timestamp.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.source_identifier == other.source_identifier && self.root_node == other.root_node
    }

    /// Whether any error node appears anywhere in the tree.
    ///
    /// Partial failure is only visible by inspecting the tree.
    pub fn has_errors(&self) -> bool {
        self.root_node.descendants().any(AnalysisResult::is_error)
    }
}
