//! Extract rule calls from parsed `--output=build` query text
//!
//! Bazel prints every rule as a call preceded by a location comment:
//!
//! ```text
//! # /abs/workspace/pkg/BUILD:12:15
//! ios_unit_test(
//!   name = "AppTests",
//!   test_host = "//pkg:App",
//! )
//! ```
//!
//! The comment is the only place the package appears, so it is tracked while
//! walking the module's top-level statements.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::LazyLock;
use tree_sitter::Node;

use super::starlark_parser::StarlarkAst;
use crate::error::{Error, Result};
use crate::types::BuildLabel;

static LOCATION_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s*(?P<dir>.*)/BUILD(?:\.bazel)?:\d+(?::\d+)?\s*$")
        .expect("location comment pattern is valid")
});

/// A rule call from query output, labelled with its package
#[derive(Debug, Clone)]
pub struct RuleCall {
    pub rule_type: String,
    pub label: BuildLabel,
    pub attributes: HashMap<String, AttributeValue>,
    pub location: SourceLocation,
}

impl RuleCall {
    pub fn package(&self) -> &str {
        self.label.package_component()
    }

    pub fn string_attr(&self, name: &str) -> Option<&str> {
        match self.attributes.get(name) {
            Some(AttributeValue::String(value)) => Some(value),
            _ => None,
        }
    }

    /// A label-list attribute; a single string is treated as a one-element list
    pub fn list_attr(&self, name: &str) -> Vec<&str> {
        match self.attributes.get(name) {
            Some(AttributeValue::List(items)) => items.iter().map(String::as_str).collect(),
            Some(AttributeValue::String(value)) => vec![value.as_str()],
            _ => Vec::new(),
        }
    }
}

/// Attribute values in rule calls
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    List(Vec<String>),
    Boolean(bool),
    Integer(i64),
}

/// Position of the rule call inside the query output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

/// Extracts rule calls from a query-output AST
pub struct RuleExtractor;

impl RuleExtractor {
    /// Extract every rule call; `workspace_root` anchors the location comments
    pub fn extract_rules(ast: &StarlarkAst, workspace_root: &Path) -> Result<Vec<RuleCall>> {
        let mut rules = Vec::new();
        let mut package: Option<String> = None;

        let root = ast.root();
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            match node.kind() {
                "comment" => {
                    if let Some(found) = Self::package_from_comment(ast.node_text(&node), workspace_root)? {
                        tracing::trace!("location comment sets package to '{}'", found);
                        package = Some(found);
                    }
                }
                "expression_statement" => {
                    let Some(call) = node.named_child(0).filter(|n| n.kind() == "call") else {
                        continue;
                    };
                    let package = package.as_deref().ok_or_else(|| {
                        Error::ParseError(format!(
                            "rule at line {} has no preceding location comment",
                            call.start_position().row + 1
                        ))
                    })?;
                    if let Some(rule) = Self::extract_rule_call(&call, ast, package)? {
                        rules.push(rule);
                    }
                }
                _ => {}
            }
        }

        tracing::debug!("Extracted {} rule calls from query output", rules.len());
        Ok(rules)
    }

    /// Package of a `# <dir>/BUILD:<line>:<col>` comment, relative to the workspace
    fn package_from_comment(text: &str, workspace_root: &Path) -> Result<Option<String>> {
        let Some(captures) = LOCATION_COMMENT.captures(text.trim()) else {
            return Ok(None);
        };
        let dir = Path::new(captures.name("dir").map_or("", |m| m.as_str()));

        let relative = dir.strip_prefix(workspace_root).map_err(|_| {
            Error::ParseError(format!(
                "BUILD file directory {} is outside workspace {}",
                dir.display(),
                workspace_root.display()
            ))
        })?;

        let segments: Vec<_> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        Ok(Some(segments.join("/")))
    }

    fn extract_rule_call(node: &Node, ast: &StarlarkAst, package: &str) -> Result<Option<RuleCall>> {
        let Some(function_node) = node.child_by_field_name("function") else {
            return Ok(None);
        };
        let rule_type = ast.node_text(&function_node).to_string();

        let mut attributes = HashMap::new();
        if let Some(args_node) = node.child_by_field_name("arguments") {
            Self::extract_arguments(&args_node, ast, &mut attributes);
        }

        let name = match attributes.get("name") {
            Some(AttributeValue::String(name)) => name.clone(),
            _ => {
                tracing::debug!("Skipping {} call without a name", rule_type);
                return Ok(None);
            }
        };

        let label = BuildLabel::resolve(&name, package)?;
        let location = SourceLocation {
            line: node.start_position().row + 1,
            column: node.start_position().column,
        };

        Ok(Some(RuleCall {
            rule_type,
            label,
            attributes,
            location,
        }))
    }

    fn extract_arguments(node: &Node, ast: &StarlarkAst, attributes: &mut HashMap<String, AttributeValue>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "keyword_argument" {
                continue;
            }
            let (Some(name_node), Some(value_node)) = (
                child.child_by_field_name("name"),
                child.child_by_field_name("value"),
            ) else {
                continue;
            };
            if let Some(value) = Self::extract_value(&value_node, ast) {
                attributes.insert(ast.node_text(&name_node).to_string(), value);
            }
        }
    }

    /// Literal values only; `select()` and other computed values are skipped
    fn extract_value(node: &Node, ast: &StarlarkAst) -> Option<AttributeValue> {
        match node.kind() {
            "string" => Some(AttributeValue::String(unquote(ast.node_text(node)))),
            "list" => {
                let mut cursor = node.walk();
                let items = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() == "string")
                    .map(|child| unquote(ast.node_text(&child)))
                    .collect();
                Some(AttributeValue::List(items))
            }
            "true" => Some(AttributeValue::Boolean(true)),
            "false" => Some(AttributeValue::Boolean(false)),
            "integer" => ast.node_text(node).parse().ok().map(AttributeValue::Integer),
            _ => None,
        }
    }
}

/// Value of a Starlark string literal: quotes removed, escapes decoded
fn unquote(text: &str) -> String {
    let (raw, literal) = match text.strip_prefix(['r', 'R']) {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let body = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|&quote| literal.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)))
        .unwrap_or(literal);
    if raw {
        return body.to_string();
    }

    let mut value = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some(escaped @ ('\\' | '"' | '\'')) => value.push(escaped),
            // Line continuation
            Some('\n') => {}
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
            None => value.push('\\'),
        }
    }
    value
}
