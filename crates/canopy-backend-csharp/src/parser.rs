//! tree-sitter implementation of the syntax-parsing service for C#.

use canopy_core::{
    Error, Result, SourceLocation, SyntaxNode, SyntaxParser, TextSpan, DEFAULT_MAX_TREE_DEPTH,
};
use std::fmt;
use std::path::Path;
use tree_sitter::{Language, Node, Parser, TreeCursor};

/// C# syntax parser.
///
/// tree-sitter recovers from malformed input, so by default a file with
/// syntax errors still yields a tree whose damaged nodes carry `has_error`.
/// In strict mode such a tree is rejected with [`Error::Parse`].
///
/// Trees nested deeper than `max_depth` are rejected in either mode.
#[derive(Clone)]
pub struct CSharpSyntaxParser {
    language: Language,
    reject_syntax_errors: bool,
    max_depth: usize,
}

impl Default for CSharpSyntaxParser {
    fn default() -> Self {
        Self {
            language: tree_sitter_c_sharp::LANGUAGE.into(),
            reject_syntax_errors: false,
            max_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }
}

impl CSharpSyntaxParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser that fails on any syntax error.
    pub fn strict() -> Self {
        Self {
            reject_syntax_errors: true,
            ..Self::default()
        }
    }

    pub fn rejects_syntax_errors(&self) -> bool {
        self.reject_syntax_errors
    }

    /// Overrides the deepest accepted tree (at least 1).
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn create_parser(&self, path: &Path) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(parser)
    }
}

impl fmt::Debug for CSharpSyntaxParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CSharpSyntaxParser")
            .field("reject_syntax_errors", &self.reject_syntax_errors)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl SyntaxParser for CSharpSyntaxParser {
    fn parse(&self, source: &str, path: &Path) -> Result<SyntaxNode> {
        let mut parser = self.create_parser(path)?;
        let tree = parser.parse(source, None).ok_or_else(|| Error::Parse {
            path: path.to_path_buf(),
            message: "Failed to parse C# source".to_string(),
        })?;
        let root = tree.root_node();

        if self.reject_syntax_errors && root.has_error() {
            let message = match first_error(root) {
                Some(node) => {
                    let at = node.start_position();
                    let what = if node.is_missing() {
                        format!("missing {}", node.kind())
                    } else {
                        "syntax error".to_string()
                    };
                    format!("{} at line {}, column {}", what, at.row, at.column)
                }
                None => "syntax error".to_string(),
            };
            return Err(Error::Parse {
                path: path.to_path_buf(),
                message,
            });
        }

        let mut cursor = root.walk();
        convert(&mut cursor, path, self.max_depth)
    }
}

/// Converts the node under `cursor` and its named descendants.
///
/// Walks with an explicit stack of open nodes; the tree is built bottom-up
/// as each node's last named child is closed.
fn convert(cursor: &mut TreeCursor<'_>, path: &Path, max_depth: usize) -> Result<SyntaxNode> {
    let display_path = path.display().to_string();
    let mut root = syntax_node(cursor, &display_path);
    let mut open: Vec<SyntaxNode> = Vec::new();

    loop {
        if descend_to_named_child(cursor) {
            if open.len() + 2 > max_depth {
                return Err(Error::Parse {
                    path: path.to_path_buf(),
                    message: format!("syntax tree nesting exceeds {} levels", max_depth),
                });
            }
            open.push(syntax_node(cursor, &display_path));
            continue;
        }

        // close finished nodes until one has a named sibling left
        loop {
            let Some(done) = open.pop() else {
                return Ok(root);
            };
            open.last_mut().unwrap_or(&mut root).children.push(done);
            if advance_to_named_sibling(cursor) {
                open.push(syntax_node(cursor, &display_path));
                break;
            }
            cursor.goto_parent();
        }
    }
}

fn syntax_node(cursor: &TreeCursor<'_>, path: &str) -> SyntaxNode {
    let node = cursor.node();
    SyntaxNode {
        type_tag: pascal_case(node.kind()),
        kind_tag: node.kind().to_string(),
        field: cursor.field_name().map(str::to_string),
        span: TextSpan::new(node.start_byte(), node.end_byte()),
        location: location(&node, path),
        has_error: node.has_error(),
        children: Vec::new(),
    }
}

/// Moves to the first named child. Leaves the cursor in place if there is none.
fn descend_to_named_child(cursor: &mut TreeCursor<'_>) -> bool {
    if !cursor.goto_first_child() {
        return false;
    }
    if cursor.node().is_named() || advance_to_named_sibling(cursor) {
        return true;
    }
    cursor.goto_parent();
    false
}

fn advance_to_named_sibling(cursor: &mut TreeCursor<'_>) -> bool {
    while cursor.goto_next_sibling() {
        if cursor.node().is_named() {
            return true;
        }
    }
    false
}

fn location(node: &Node<'_>, path: &str) -> SourceLocation {
    let start = node.start_position();
    let end = node.end_position();
    SourceLocation {
        path: path.to_string(),
        start_line: start.row,
        start_col: start.column,
        end_line: end.row,
        end_col: end.column,
        has_mapped_path: false,
    }
}

/// First ERROR or MISSING node in document order.
///
/// Only subtrees flagged with `has_error` are entered.
fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// `class_declaration` → `ClassDeclaration`, `ERROR` → `Error`.
pub fn pascal_case(kind: &str) -> String {
    kind.split(['_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
