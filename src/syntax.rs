//! JavaScript syntax trees and the node shapes the transforms care about
//!
//! Parsing is done with tree-sitter's JavaScript grammar. Recognition of
//! dynamic imports, marked instrumentation calls and the instrumentation
//! import declaration is done on node kinds and fields, never on raw text.

use crate::error::{Error, Result};
use crate::module_path::normalize;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Parse JavaScript source, rejecting trees that contain syntax errors
pub fn parse(source: &str, path: &Path) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|e| Error::Configuration(format!("incompatible JavaScript grammar: {}", e)))?;

    let tree = parser.parse(source, None).ok_or_else(|| Error::Parse {
        path: path.to_path_buf(),
        line: 1,
        column: 1,
    })?;

    let root = tree.root_node();
    if root.has_error() {
        let at = preorder(root)
            .into_iter()
            .find(|n| n.is_error() || n.is_missing())
            .unwrap_or(root);
        let pos = at.start_position();
        return Err(Error::Parse {
            path: path.to_path_buf(),
            line: pos.row + 1,
            column: pos.column + 1,
        });
    }

    Ok(tree)
}

/// Source text covered by a node
pub fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// All nodes below and including `root`, parents before children
pub fn preorder(root: Node<'_>) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut cursor = root.walk();
    loop {
        nodes.push(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return nodes;
            }
        }
    }
}

/// All nodes below and including `root`, children before parents
pub fn postorder(root: Node<'_>) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut cursor = root.walk();
    loop {
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            nodes.push(cursor.node());
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return nodes;
            }
        }
    }
}

/// Value of a string literal node, with escapes decoded
///
/// Returns `None` for anything that is not a plain `'...'` / `"..."` string.
pub fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut value = String::new();
    let mut cursor = node.walk();
    for part in node.named_children(&mut cursor) {
        match part.kind() {
            "string_fragment" => value.push_str(text(part, source)),
            "escape_sequence" => decode_escape(text(part, source), &mut value),
            _ => {}
        }
    }
    Some(value)
}

fn decode_escape(escape: &str, out: &mut String) {
    let body = &escape[1..];
    let decoded = match body {
        "n" => Some('\n'),
        "t" => Some('\t'),
        "r" => Some('\r'),
        "b" => Some('\u{8}'),
        "f" => Some('\u{c}'),
        "v" => Some('\u{b}'),
        "0" => Some('\0'),
        _ if body.starts_with('x') || body.starts_with('u') => {
            let hex = body[1..].trim_start_matches('{').trim_end_matches('}');
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        }
        // Line continuations vanish
        _ if body.starts_with('\n') || body.starts_with('\r') => return,
        _ => body.chars().next(),
    };
    if let Some(c) = decoded {
        out.push(c);
    }
}

/// The parenthesized argument list of a call
fn argument_list(call: Node<'_>) -> Option<Node<'_>> {
    call.child_by_field_name("arguments")
        .filter(|args| args.kind() == "arguments")
}

/// Named children of the argument list, skipping comments
fn arguments_of<'t>(call: Node<'t>) -> Vec<Node<'t>> {
    let Some(args) = argument_list(call) else {
        return Vec::new();
    };
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// Callee name of a call whose function is a plain identifier
fn callee_name<'s>(call: Node<'_>, source: &'s str) -> Option<&'s str> {
    let callee = call.child_by_field_name("function")?;
    (callee.kind() == "identifier").then(|| text(callee, source))
}

/// A dynamic `import(...)` expression
#[derive(Debug, Clone, Copy)]
pub struct DynamicImport<'t> {
    pub call: Node<'t>,
    /// `( ... )`, comments included
    pub arguments: Option<Node<'t>>,
    /// The first argument, if any
    pub source: Option<Node<'t>>,
    /// Arguments other than comments
    pub argument_count: usize,
}

impl<'t> DynamicImport<'t> {
    pub fn from_node(node: Node<'t>) -> Option<Self> {
        if node.kind() != "call_expression" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        if function.kind() != "import" {
            return None;
        }
        let args = arguments_of(node);
        Some(Self {
            call: node,
            arguments: argument_list(node),
            source: args.first().copied(),
            argument_count: args.len(),
        })
    }

    /// The literal module path, when the argument is a plain string
    pub fn literal_source(&self, source: &str) -> Option<String> {
        self.source.and_then(|n| string_value(n, source))
    }

    /// The enclosing `await` expression, or the call itself
    pub fn outer(&self) -> Node<'t> {
        match self.call.parent() {
            Some(parent) if parent.kind() == "await_expression" => parent,
            _ => self.call,
        }
    }
}

/// True if `node` is passed as an argument to a call of one of `callees`
pub fn is_argument_of_call(node: Node<'_>, source: &str, callees: &[&str]) -> bool {
    let Some(args) = node.parent() else {
        return false;
    };
    if args.kind() != "arguments" {
        return false;
    }
    let Some(call) = args.parent() else {
        return false;
    };
    call.kind() == "call_expression"
        && callee_name(call, source).is_some_and(|name| callees.contains(&name))
}

/// A call to the instrumentation entry point carrying the marker literal
#[derive(Debug, Clone)]
pub struct MarkedCall<'t> {
    pub call: Node<'t>,
    pub callee: Node<'t>,
    pub arguments: Node<'t>,
    pub module_path: Node<'t>,
    pub marker: Node<'t>,
    /// Arguments other than comments
    pub argument_count: usize,
}

impl<'t> MarkedCall<'t> {
    pub fn from_node(node: Node<'t>, source: &str, callees: &[&str], marker: &str) -> Option<Self> {
        if node.kind() != "call_expression" {
            return None;
        }
        let name = callee_name(node, source)?;
        if !callees.contains(&name) {
            return None;
        }
        let args = arguments_of(node);
        if args.len() < 4 || string_value(args[3], source).as_deref() != Some(marker) {
            return None;
        }
        Some(Self {
            call: node,
            callee: node.child_by_field_name("function")?,
            arguments: argument_list(node)?,
            module_path: args[0],
            marker: args[3],
            argument_count: args.len(),
        })
    }
}

/// A top-level `import ... from '<source>'` declaration
#[derive(Debug, Clone)]
pub struct ImportBinding<'t> {
    pub statement: Node<'t>,
    pub source_value: String,
    /// Local name of the default import, if there is one
    pub default_local: Option<String>,
    /// Number of bindings the declaration introduces
    pub specifier_count: usize,
}

impl<'t> ImportBinding<'t> {
    pub fn from_node(node: Node<'t>, source: &str) -> Option<Self> {
        if node.kind() != "import_statement" {
            return None;
        }
        let source_value = string_value(node.child_by_field_name("source")?, source)?;

        let mut default_local = None;
        let mut specifier_count = 0;
        let mut cursor = node.walk();
        let clause = node
            .named_children(&mut cursor)
            .find(|n| n.kind() == "import_clause");
        if let Some(clause) = clause {
            let mut clause_cursor = clause.walk();
            for part in clause.named_children(&mut clause_cursor) {
                match part.kind() {
                    "identifier" => {
                        default_local = Some(text(part, source).to_string());
                        specifier_count += 1;
                    }
                    "namespace_import" => specifier_count += 1,
                    "named_imports" => {
                        let mut inner = part.walk();
                        specifier_count += part
                            .named_children(&mut inner)
                            .filter(|n| n.kind() == "import_specifier")
                            .count();
                    }
                    _ => {}
                }
            }
        }

        Some(Self {
            statement: node,
            source_value,
            default_local,
            specifier_count,
        })
    }

    /// True if the import source, resolved from `dir`, is `target`
    pub fn resolves_to(&self, dir: &Path, target: &Path) -> bool {
        normalize(&dir.join(&self.source_value)) == normalize(target)
    }

    /// Exactly one binding, and it is the default import
    pub fn is_sole_default(&self) -> bool {
        self.specifier_count == 1 && self.default_local.is_some()
    }
}

/// Find the first declaration importing `target` as a default binding
///
/// Namespace-only and named-only imports of `target` do not count.
pub fn find_import_binding<'t>(
    root: Node<'t>,
    source: &str,
    dir: &Path,
    target: &Path,
) -> Option<ImportBinding<'t>> {
    let mut cursor = root.walk();
    let found = root
        .named_children(&mut cursor)
        .filter_map(|n| ImportBinding::from_node(n, source))
        .find(|binding| binding.default_local.is_some() && binding.resolves_to(dir, target));
    found
}

/// Byte offset where a new leading statement should go
///
/// That is the start of the first statement, after any hashbang line and
/// leading comments. `None` if the program has no statements.
pub fn first_statement_start(root: Node<'_>) -> Option<usize> {
    let mut cursor = root.walk();
    let first = root
        .named_children(&mut cursor)
        .find(|n| !matches!(n.kind(), "comment" | "hash_bang_line"));
    first.map(|n| n.start_byte())
}

/// Names exported by a module, with the source text that defines each
pub fn exported_names(root: Node<'_>, source: &str) -> Vec<(String, String)> {
    let mut exports = Vec::new();
    let mut cursor = root.walk();
    for stmt in root.named_children(&mut cursor) {
        if stmt.kind() != "export_statement" {
            continue;
        }

        let mut kw = stmt.walk();
        let is_default = stmt.children(&mut kw).any(|c| c.kind() == "default");
        let declaration = stmt.child_by_field_name("declaration");

        if is_default {
            let body = declaration
                .or_else(|| stmt.child_by_field_name("value"))
                .map(|n| text(n, source))
                .unwrap_or_default();
            exports.push(("default".to_string(), body.to_string()));
            continue;
        }

        if let Some(decl) = declaration {
            for name in declared_names(decl, source) {
                exports.push((name, text(decl, source).to_string()));
            }
            continue;
        }

        let mut inner = stmt.walk();
        let clause = stmt
            .named_children(&mut inner)
            .find(|n| n.kind() == "export_clause");
        if let Some(clause) = clause {
            let mut spec_cursor = clause.walk();
            for spec in clause.named_children(&mut spec_cursor) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let exported = spec
                    .child_by_field_name("alias")
                    .or_else(|| spec.child_by_field_name("name"));
                if let Some(exported) = exported {
                    let name = string_value(exported, source)
                        .unwrap_or_else(|| text(exported, source).to_string());
                    exports.push((name, text(spec, source).to_string()));
                }
            }
        }
    }
    exports
}

fn declared_names(decl: Node<'_>, source: &str) -> Vec<String> {
    match decl.kind() {
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = decl.walk();
            decl.named_children(&mut cursor)
                .filter(|n| n.kind() == "variable_declarator")
                .filter_map(|n| n.child_by_field_name("name"))
                .filter(|n| n.kind() == "identifier")
                .map(|n| text(n, source).to_string())
                .collect()
        }
        _ => decl
            .child_by_field_name("name")
            .map(|n| vec![text(n, source).to_string()])
            .unwrap_or_default(),
    }
}
