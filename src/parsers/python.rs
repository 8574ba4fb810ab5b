//! Python driver: `function_definition`/`class_definition`
//! (methods named `Class.method`), `async def`, decorators via
//! `decorated_definition`, underscore-convention visibility, docstring from
//! the first string statement in the body, module-level `UPPER_CASE`
//! constants, `self`/`cls` stripped from parameter lists.

use crate::model::{Parameter, Symbol, SymbolMetadata, SymbolType, MAX_BODY_CHARS, MAX_CALLS, MAX_IMPORTS};
use crate::parsers::common::*;
use tree_sitter::{Language as TsLanguage, Node, Parser};

pub fn language() -> TsLanguage {
    tree_sitter_python::language()
}

fn visibility_from_name(name: &str) -> &'static str {
    if name.starts_with("__") && !name.ends_with("__") {
        "private"
    } else if name.starts_with('_') {
        "protected"
    } else {
        "public"
    }
}

fn is_module_constant(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
}

fn extract_calls(source: &[u8], body: Node) -> Vec<String> {
    let names = run_query_strings(
        source,
        body,
        language(),
        r#"(call function: (identifier) @call)
           (call function: (attribute attribute: (identifier) @call))"#,
        "call",
    )
    .unwrap_or_default();
    dedup_capped(names, MAX_CALLS)
}

fn file_imports(source: &[u8], root: Node) -> Vec<String> {
    let mut out = Vec::new();
    out.extend(run_query_strings(
        source,
        root,
        language(),
        r#"(import_statement name: (dotted_name) @mod)"#,
        "mod",
    ).unwrap_or_default());
    out.extend(run_query_strings(
        source,
        root,
        language(),
        r#"(import_from_statement module_name: (dotted_name) @mod)"#,
        "mod",
    ).unwrap_or_default());
    dedup_capped(out, MAX_IMPORTS)
}

fn docstring_of_body(source: &[u8], body: Node) -> String {
    let mut c = body.walk();
    for stmt in body.children(&mut c) {
        if stmt.kind() == "expression_statement" {
            if let Some(expr) = stmt.child(0) {
                if expr.kind() == "string" {
                    let text = node_text(source, expr).trim();
                    return strip_python_string_quotes(text);
                }
            }
            break;
        }
        if stmt.kind() == "comment" {
            continue;
        }
        break;
    }
    String::new()
}

fn strip_python_string_quotes(s: &str) -> String {
    let mut t = s;
    for prefix in ["\"\"\"", "'''"] {
        if let Some(rest) = t.strip_prefix(prefix) {
            t = rest.strip_suffix(prefix).unwrap_or(rest);
            return t.trim().to_string();
        }
    }
    strip_string_quotes(t)
}

fn decorators_of(source: &[u8], decorated: Node) -> Vec<String> {
    let mut out = Vec::new();
    let mut c = decorated.walk();
    for child in decorated.children(&mut c) {
        if child.kind() == "decorator" {
            out.push(node_text(source, child).trim_start_matches('@').trim().to_string());
        }
    }
    out
}

fn params_of(source: &[u8], params_node: Option<Node>) -> Vec<Parameter> {
    let Some(params_node) = params_node else { return Vec::new() };
    let mut out = Vec::new();
    let mut c = params_node.walk();
    for child in params_node.children(&mut c) {
        let (name, ty, variadic) = match child.kind() {
            "identifier" => (node_text(source, child).to_string(), None, false),
            "typed_parameter" => {
                let n = child.child(0).map(|n| node_text(source, n).to_string()).unwrap_or_default();
                let t = child.child_by_field_name("type").map(|n| node_text(source, n).trim().to_string());
                (n, t, false)
            }
            "default_parameter" | "typed_default_parameter" => {
                let n = child.child_by_field_name("name").map(|n| node_text(source, n).to_string()).unwrap_or_default();
                let t = child.child_by_field_name("type").map(|n| node_text(source, n).trim().to_string());
                (n, t, false)
            }
            "list_splat_pattern" | "dictionary_splat_pattern" => {
                (node_text(source, child).trim_start_matches(['*']).to_string(), None, true)
            }
            _ => continue,
        };
        if name == "self" || name == "cls" || name.is_empty() {
            continue;
        }
        out.push(Parameter { name, type_: ty, variadic });
    }
    out
}

pub fn parse(path: &str, source_text: &str) -> Vec<Symbol> {
    let mut parser = Parser::new();
    if parser.set_language(language()).is_err() {
        tracing::warn!(path, "failed to set python grammar");
        return Vec::new();
    }
    let Some(tree) = parser.parse(source_text, None) else {
        tracing::warn!(path, "python parse failed");
        return Vec::new();
    };
    let source = source_text.as_bytes();
    let root = tree.root_node();
    let imports = file_imports(source, root);

    let mut symbols = Vec::new();
    walk_body(source, path, root, &mut symbols, None);
    for s in &mut symbols {
        s.imports = imports.clone();
    }
    symbols
}

fn walk_body(source: &[u8], path: &str, node: Node, out: &mut Vec<Symbol>, class_name: Option<&str>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let (def_node, decorators) = if child.kind() == "decorated_definition" {
            let decs = decorators_of(source, child);
            let inner = child.child_by_field_name("definition");
            match inner {
                Some(inner) => (inner, decs),
                None => continue,
            }
        } else {
            (child, Vec::new())
        };

        match def_node.kind() {
            "function_definition" => {
                let Some(name_node) = def_node.child_by_field_name("name") else { continue };
                let base_name = node_text(source, name_node).to_string();
                let full_name = match class_name {
                    Some(c) => format!("{c}.{base_name}"),
                    None => base_name.clone(),
                };
                let body_node = def_node.child_by_field_name("body").unwrap_or(def_node);
                let is_async = def_node
                    .child(0)
                    .map(|n| node_text(source, n) == "async")
                    .unwrap_or(false);

                let is_hook = base_name.starts_with("use_") || base_name.starts_with("use");
                let symbol_type = if class_name.is_some() {
                    SymbolType::Method
                } else if is_hook {
                    SymbolType::Function
                } else {
                    SymbolType::Function
                };

                let metadata = SymbolMetadata {
                    parameters: params_of(source, def_node.child_by_field_name("parameters")),
                    return_type: def_node.child_by_field_name("return_type").map(|n| node_text(source, n).trim().to_string()),
                    decorators,
                    visibility: Some(visibility_from_name(&base_name).to_string()),
                    is_async,
                    ..Default::default()
                };

                let body_text = truncate_chars(node_text(source, body_node), MAX_BODY_CHARS);
                out.push(Symbol {
                    name: full_name,
                    symbol_type,
                    path: path.to_string(),
                    start_line: def_node.start_position().row as u32 + 1,
                    end_line: def_node.end_position().row as u32 + 1,
                    body: body_text,
                    js_doc: docstring_of_body(source, body_node),
                    calls: extract_calls(source, body_node),
                    imports: Vec::new(),
                    metadata,
                });

                if class_name.is_none() {
                    walk_body(source, path, body_node, out, None);
                }
            }
            "class_definition" => {
                let Some(name_node) = def_node.child_by_field_name("name") else { continue };
                let name = node_text(source, name_node).to_string();
                let body_node = def_node.child_by_field_name("body").unwrap_or(def_node);

                out.push(Symbol {
                    name: name.clone(),
                    symbol_type: SymbolType::Class,
                    path: path.to_string(),
                    start_line: def_node.start_position().row as u32 + 1,
                    end_line: def_node.end_position().row as u32 + 1,
                    body: truncate_chars(node_text(source, body_node), MAX_BODY_CHARS),
                    js_doc: docstring_of_body(source, body_node),
                    calls: Vec::new(),
                    imports: Vec::new(),
                    metadata: SymbolMetadata { decorators, ..Default::default() },
                });

                walk_body(source, path, body_node, out, Some(&name));
            }
            "expression_statement" if class_name.is_none() => {
                // Module-level `NAME = ...` / `NAME: T = ...` constants.
                if let Some(assign) = def_node.child(0) {
                    if matches!(assign.kind(), "assignment") {
                        if let Some(left) = assign.child_by_field_name("left") {
                            if left.kind() == "identifier" {
                                let name = node_text(source, left).to_string();
                                if is_module_constant(&name) {
                                    out.push(Symbol {
                                        name,
                                        symbol_type: SymbolType::Constant,
                                        path: path.to_string(),
                                        start_line: def_node.start_position().row as u32 + 1,
                                        end_line: def_node.end_position().row as u32 + 1,
                                        body: truncate_chars(node_text(source, def_node), MAX_BODY_CHARS),
                                        js_doc: String::new(),
                                        calls: Vec::new(),
                                        imports: Vec::new(),
                                        metadata: SymbolMetadata::default(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
