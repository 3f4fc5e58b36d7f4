//! Starlark parser for `bazel query --output=build` text, using tree-sitter-starlark

use crate::error::{Error, Result};
use tree_sitter::{Node, Parser, Tree};

/// Parser for BUILD-syntax query output
pub struct StarlarkParser {
    parser: Parser,
}

impl StarlarkParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_starlark::LANGUAGE;
        parser
            .set_language(&language.into())
            .map_err(|e| Error::ParseError(format!("Failed to set Starlark language: {e}")))?;

        Ok(Self { parser })
    }

    /// Parse query output into an AST; any syntax error rejects the whole output
    pub fn parse(&mut self, content: &str) -> Result<StarlarkAst> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| Error::ParseError("Failed to parse query output".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            let position = first_error(root)
                .map(|node| node.start_position())
                .unwrap_or_else(|| root.start_position());
            return Err(Error::ParseError(format!(
                "query output contains syntax errors near line {}",
                position.row + 1
            )));
        }

        Ok(StarlarkAst {
            tree,
            source: content.to_string(),
        })
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

/// Parsed Starlark AST
pub struct StarlarkAst {
    pub tree: Tree,
    pub source: String,
}

impl StarlarkAst {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn node_text<'a>(&'a self, node: &Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }
}
