//! Normalization of syntax trees into the generic node model.
//!
//! Type-specific attributes come from an [`AttributeTable`]: a dispatch table
//! keyed by kind tag, where each entry is a pure function from a syntax node
//! (and the source text) to an attribute map.

use crate::node::{AnalysisResult, Attributes};
use crate::syntax::SyntaxNode;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Marker appended to truncated source text.
pub const TRUNCATION_MARKER: &str = "…";

/// Default child count above which children are normalized in parallel.
pub const DEFAULT_PARALLEL_CHILD_THRESHOLD: usize = 50;

/// Default maximum number of characters kept in `source_text`.
pub const DEFAULT_MAX_SOURCE_TEXT_LENGTH: usize = 4096;

/// Attribute extractor for a single construct.
pub type AttributeExtractor = fn(&SyntaxNode, &str) -> Attributes;

/// Options controlling normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Nodes with more children than this are traversed in parallel.
    pub parallel_child_threshold: usize,
    /// Maximum characters of source text per node. `0` disables truncation.
    pub max_source_text_length: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            parallel_child_threshold: DEFAULT_PARALLEL_CHILD_THRESHOLD,
            max_source_text_length: DEFAULT_MAX_SOURCE_TEXT_LENGTH,
        }
    }
}

/// Dispatch table from kind tag to attribute extractor.
#[derive(Clone, Default)]
pub struct AttributeTable {
    extractors: HashMap<&'static str, AttributeExtractor>,
}

impl AttributeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extractor for a kind tag. A later registration for the
    /// same kind replaces the earlier one.
    pub fn register(&mut self, kind: &'static str, extractor: AttributeExtractor) {
        self.extractors.insert(kind, extractor);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, kind: &'static str, extractor: AttributeExtractor) -> Self {
        self.register(kind, extractor);
        self
    }

    /// Whether an extractor is registered for `kind`.
    pub fn contains(&self, kind: &str) -> bool {
        self.extractors.contains_key(kind)
    }

    /// Number of registered constructs.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Runs the extractor registered for the node's kind, if any.
    pub fn extract(&self, node: &SyntaxNode, source: &str) -> Attributes {
        self.extractors
            .get(node.kind_tag.as_str())
            .map(|extractor| extractor(node, source))
            .unwrap_or_default()
    }
}

impl fmt::Debug for AttributeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.extractors.keys().collect();
        kinds.sort();
        f.debug_struct("AttributeTable").field("kinds", &kinds).finish()
    }
}

/// Converts a [`SyntaxNode`] tree into an [`AnalysisResult`] tree.
pub struct Normalizer<'a> {
    table: &'a AttributeTable,
    source: &'a str,
    options: NormalizeOptions,
}

impl<'a> Normalizer<'a> {
    pub fn new(table: &'a AttributeTable, source: &'a str, options: NormalizeOptions) -> Self {
        Self {
            table,
            source,
            options,
        }
    }

    /// Normalizes a subtree. Child order always matches document order.
    ///
    /// Traversal uses an explicit work stack, so tree depth is bounded by
    /// memory rather than by the thread's stack.
    pub fn normalize(&self, root: &SyntaxNode) -> AnalysisResult {
        let mut stack = vec![Pending::new(root)];
        while let Some(top) = stack.last_mut() {
            let node = top.node;
            let fan_out = node.children.len();
            if top.children.is_empty() && fan_out > 1 && fan_out > self.options.parallel_child_threshold {
                // indexed collect keeps input order
                top.children = node
                    .children
                    .par_iter()
                    .map(|child| self.normalize(child))
                    .collect();
            }
            if let Some(next) = node.children.get(top.children.len()) {
                stack.push(Pending::new(next));
                continue;
            }

            let Some(done) = stack.pop() else { break };
            let result = self.finish(done.node, done.children);
            match stack.last_mut() {
                Some(parent) => parent.children.push(result),
                None => return result,
            }
        }
        AnalysisResult::default()
    }

    fn finish(&self, node: &SyntaxNode, children: Vec<AnalysisResult>) -> AnalysisResult {
        let mut attributes = self.table.extract(node, self.source);
        if node.has_error {
            attributes.insert("containsDiagnostics".to_string(), Value::Bool(true));
        }

        AnalysisResult {
            type_tag: node.type_tag.clone(),
            kind_tag: node.kind_tag.clone(),
            source_text: truncate_text(node.text(self.source), self.options.max_source_text_length),
            span: node.span,
            location: node.location.clone(),
            attributes,
            children,
        }
    }
}

/// A syntax node whose children are partly normalized.
struct Pending<'n> {
    node: &'n SyntaxNode,
    children: Vec<AnalysisResult>,
}

impl<'n> Pending<'n> {
    fn new(node: &'n SyntaxNode) -> Self {
        Self {
            node,
            children: Vec::with_capacity(node.children.len()),
        }
    }
}

/// Truncates `text` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TextSpan;

    fn syntax(kind: &str, start: usize, end: usize) -> SyntaxNode {
        SyntaxNode {
            type_tag: kind.to_uppercase(),
            kind_tag: kind.to_string(),
            span: TextSpan::new(start, end),
            ..SyntaxNode::default()
        }
    }

    fn name_extractor(node: &SyntaxNode, source: &str) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("text".to_string(), Value::String(node.text(source).to_string()));
        attrs
    }

    #[test]
    fn test_truncate_text_on_char_boundary() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello", 5), "hello");
        assert_eq!(truncate_text("hello", 3), "hel…");
        assert_eq!(truncate_text("héllo", 2), "hé…");
        assert_eq!(truncate_text("hello", 0), "hello");
    }

    #[test]
    fn test_attribute_table_dispatch() {
        let table = AttributeTable::new().with("ident", name_extractor);
        assert!(table.contains("ident"));
        assert_eq!(table.len(), 1);

        let source = "abc def";
        let attrs = table.extract(&syntax("ident", 4, 7), source);
        assert_eq!(attrs["text"], "def");
        assert!(table.extract(&syntax("other", 0, 3), source).is_empty());
    }

    #[test]
    fn test_diagnostics_flag_is_added() {
        let table = AttributeTable::new();
        let mut node = syntax("broken", 0, 1);
        node.has_error = true;
        let result = Normalizer::new(&table, "x", NormalizeOptions::default()).normalize(&node);
        assert_eq!(result.attributes["containsDiagnostics"], Value::Bool(true));
        assert_eq!(result.type_tag, "BROKEN");
        assert_eq!(result.source_text, "x");
    }

    #[test]
    fn test_parallel_children_keep_document_order() {
        let source: String = (0..200).map(|i| format!("{:03}", i)).collect();
        let mut root = syntax("root", 0, source.len());
        root.children = (0..200).map(|i| syntax("ident", i * 3, i * 3 + 3)).collect();

        let table = AttributeTable::new().with("ident", name_extractor);
        for threshold in [0, 1, 50, 1000] {
            let options = NormalizeOptions {
                parallel_child_threshold: threshold,
                max_source_text_length: 0,
            };
            let result = Normalizer::new(&table, &source, options).normalize(&root);
            assert_eq!(result.children.len(), 200);
            for (i, child) in result.children.iter().enumerate() {
                assert_eq!(child.attributes["text"], format!("{:03}", i));
                assert_eq!(child.span.start, i * 3);
            }
        }
    }

    /// `depth` nested nodes, each spanning the whole source.
    fn chain(depth: usize, source_len: usize) -> SyntaxNode {
        let mut node = syntax("leaf", 0, source_len);
        for _ in 1..depth {
            let mut parent = syntax("binary_expression", 0, source_len);
            parent.children.push(node);
            node = parent;
        }
        node
    }

    #[test]
    fn test_deep_tree_normalizes_on_small_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let tree = chain(crate::syntax::DEFAULT_MAX_TREE_DEPTH, 3);
                let table = AttributeTable::new();
                let result = Normalizer::new(&table, "1+1", NormalizeOptions::default()).normalize(&tree);
                (tree.descendant_count(), result.node_count(), result.kind_tag.clone())
            })
            .unwrap();
        let (syntax_count, result_count, root_kind) = handle.join().unwrap();
        assert_eq!(syntax_count, crate::syntax::DEFAULT_MAX_TREE_DEPTH);
        assert_eq!(result_count, crate::syntax::DEFAULT_MAX_TREE_DEPTH);
        assert_eq!(root_kind, "binary_expression");
    }

    #[test]
    fn test_parallel_nodes_inside_sequential_ones() {
        let source: String = (0..10).map(|i| i.to_string()).collect();
        let mut wide = syntax("wide", 0, 10);
        wide.children = (0..10).map(|i| syntax("ident", i, i + 1)).collect();
        let mut root = syntax("root", 0, 10);
        root.children.push(syntax("ident", 0, 1));
        root.children.push(wide);
        root.children.push(syntax("ident", 9, 10));

        let table = AttributeTable::new().with("ident", name_extractor);
        let options = NormalizeOptions {
            parallel_child_threshold: 5,
            max_source_text_length: 0,
        };
        let result = Normalizer::new(&table, &source, options).normalize(&root);
        assert_eq!(result.node_count(), 14);
        assert_eq!(result.children[2].attributes["text"], "9");
        let texts: Vec<_> = result.children[1]
            .children
            .iter()
            .map(|c| c.attributes["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, (0..10).map(|i| i.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_nested_trees_are_normalized_recursively() {
        let source = "a(b c)";
        let mut call = syntax("call", 0, 6);
        call.children.push(syntax("ident", 2, 3));
        call.children.push(syntax("ident", 4, 5));
        let mut root = syntax("root", 0, 6);
        root.children.push(call);

        let table = AttributeTable::new().with("ident", name_extractor);
        let result = Normalizer::new(&table, source, NormalizeOptions::default()).normalize(&root);
        assert_eq!(result.node_count(), 4);
        assert_eq!(result.children[0].children[1].attributes["text"], "c");
        assert_eq!(result.children[0].source_text, "a(b c)");
    }
}
