//! Rust driver: tree-sitter queries for top-level items, `impl` methods,
//! doc comments, visibility, generics, and call/import extraction.

use crate::model::{Parameter, Symbol, SymbolMetadata, SymbolType, MAX_BODY_CHARS, MAX_CALLS, MAX_IMPORTS};
use crate::parsers::common::*;
use tree_sitter::{Language as TsLanguage, Node, Parser};

pub fn language() -> TsLanguage {
    tree_sitter_rust::language()
}

fn visibility(source: &[u8], node: Node) -> Option<String> {
    let mut c = node.walk();
    for child in node.children(&mut c) {
        if child.kind() == "visibility_modifier" {
            return Some(node_text(source, child).trim().to_string());
        }
    }
    None
}

fn doc_comment(source: &[u8], node: Node) -> String {
    leading_doc_comment(source, node, &["///", "//!", "//"])
}

fn extract_calls(source: &[u8], body: Node) -> Vec<String> {
    let names = run_query_strings(
        source,
        body,
        language(),
        r#"(call_expression function: (identifier) @call)
           (call_expression function: (field_expression field: (field_identifier) @call))
           (macro_invocation macro: (identifier) @call)"#,
        "call",
    )
    .unwrap_or_default();
    dedup_capped(names, MAX_CALLS)
}

fn file_imports(source: &[u8], root: Node) -> Vec<String> {
    let paths = run_query_strings(
        source,
        root,
        language(),
        r#"(use_declaration argument: (_) @path)"#,
        "path",
    )
    .unwrap_or_default();
    dedup_capped(paths, MAX_IMPORTS)
}

fn params_from_parameters_node(source: &[u8], params: Option<Node>) -> Vec<Parameter> {
    let Some(params) = params else { return Vec::new() };
    let mut out = Vec::new();
    let mut c = params.walk();
    for child in params.children(&mut c) {
        match child.kind() {
            "parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .map(|n| node_text(source, n).trim().to_string())
                    .unwrap_or_default();
                let ty = child.child_by_field_name("type").map(|n| node_text(source, n).trim().to_string());
                if !name.is_empty() {
                    out.push(Parameter { name, type_: ty, variadic: false });
                }
            }
            "self_parameter" => {
                out.push(Parameter {
                    name: node_text(source, child).trim().to_string(),
                    type_: None,
                    variadic: false,
                });
            }
            _ => {}
        }
    }
    out
}

fn generics(source: &[u8], node: Node) -> Vec<String> {
    let Some(params) = node.child_by_field_name("type_parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut c = params.walk();
    for child in params.children(&mut c) {
        if matches!(child.kind(), "type_parameter" | "lifetime" | "constrained_type_parameter") {
            out.push(node_text(source, child).trim().to_string());
        }
    }
    out
}

fn signature_up_to_brace(source: &[u8], node: Node) -> String {
    let text = node_text(source, node);
    match text.find('{') {
        Some(i) => text[..i].trim().to_string(),
        None => text.trim().to_string(),
    }
}

fn push_symbol(
    out: &mut Vec<Symbol>,
    source: &[u8],
    path: &str,
    node: Node,
    body_node: Node,
    name: String,
    symbol_type: SymbolType,
    metadata: SymbolMetadata,
) {
    let body_text = truncate_chars(node_text(source, body_node), MAX_BODY_CHARS);
    out.push(Symbol {
        name,
        symbol_type,
        path: path.to_string(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        body: body_text,
        js_doc: doc_comment(source, node),
        calls: extract_calls(source, body_node),
        imports: Vec::new(), // filled in by caller with file-level imports
        metadata,
    });
}

pub fn parse(path: &str, source_text: &str) -> Vec<Symbol> {
    let mut parser = Parser::new();
    if parser.set_language(language()).is_err() {
        tracing::warn!(path, "failed to set rust grammar");
        return Vec::new();
    }
    let Some(tree) = parser.parse(source_text, None) else {
        tracing::warn!(path, "rust parse failed");
        return Vec::new();
    };
    let source = source_text.as_bytes();
    let root = tree.root_node();
    let imports = file_imports(source, root);

    let mut symbols = Vec::new();
    walk_items(source, path, root, &mut symbols, None);

    for s in &mut symbols {
        s.imports = imports.clone();
    }
    symbols
}

fn walk_items(source: &[u8], path: &str, node: Node, out: &mut Vec<Symbol>, impl_type: Option<&str>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_item" => {
                let Some(name_node) = child.child_by_field_name("name") else { continue };
                let base_name = node_text(source, name_node).to_string();
                let name = match impl_type {
                    Some(ty) => format!("{ty}.{base_name}"),
                    None => base_name,
                };
                let symbol_type = if impl_type.is_some() { SymbolType::Method } else { SymbolType::Function };
                let body_node = child.child_by_field_name("body").unwrap_or(child);
                let is_async = child_has_kind(child, "async");
                let metadata = SymbolMetadata {
                    parameters: params_from_parameters_node(source, child.child_by_field_name("parameters")),
                    return_type: child.child_by_field_name("return_type").map(|n| node_text(source, n).trim().to_string()),
                    generics: generics(source, child),
                    visibility: visibility(source, child),
                    is_async,
                    ..Default::default()
                };
                push_symbol(out, source, path, child, body_node, name, symbol_type, metadata);
            }
            "struct_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(source, name_node).to_string();
                    let metadata = SymbolMetadata {
                        generics: generics(source, child),
                        visibility: visibility(source, child),
                        ..Default::default()
                    };
                    push_symbol(out, source, path, child, child, name, SymbolType::Class, metadata);
                }
            }
            "enum_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(source, name_node).to_string();
                    let metadata = SymbolMetadata {
                        generics: generics(source, child),
                        visibility: visibility(source, child),
                        ..Default::default()
                    };
                    push_symbol(out, source, path, child, child, name, SymbolType::Enum, metadata);
                }
            }
            "trait_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(source, name_node).to_string();
                    let metadata = SymbolMetadata {
                        generics: generics(source, child),
                        visibility: visibility(source, child),
                        ..Default::default()
                    };
                    push_symbol(out, source, path, child, child, name, SymbolType::Interface, metadata);
                }
            }
            "const_item" | "static_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(source, name_node).to_string();
                    let metadata = SymbolMetadata {
                        return_type: child.child_by_field_name("type").map(|n| node_text(source, n).trim().to_string()),
                        visibility: visibility(source, child),
                        ..Default::default()
                    };
                    push_symbol(out, source, path, child, child, name, SymbolType::Variable, metadata);
                }
            }
            "type_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(source, name_node).to_string();
                    let metadata = SymbolMetadata {
                        generics: generics(source, child),
                        visibility: visibility(source, child),
                        ..Default::default()
                    };
                    push_symbol(out, source, path, child, child, name, SymbolType::Type, metadata);
                }
            }
            "impl_item" => {
                let self_ty = child
                    .child_by_field_name("type")
                    .map(|n| node_text(source, n).trim().to_string())
                    .unwrap_or_default();
                let trait_impl = child.child_by_field_name("trait").map(|n| {
                    format!("impl {} for {}", node_text(source, n).trim(), self_ty)
                });
                if let Some(body) = child.child_by_field_name("body") {
                    let before = out.len();
                    walk_items(source, path, body, out, Some(&self_ty));
                    if let Some(t) = trait_impl {
                        for s in &mut out[before..] {
                            s.metadata.trait_impl = Some(t.clone());
                        }
                    }
                }
            }
            "mod_item" => {
                if let Some(body) = child.child_by_field_name("body") {
                    walk_items(source, path, body, out, impl_type);
                }
            }
            _ => {}
        }
    }
}

fn child_has_kind(node: Node, kind: &str) -> bool {
    let mut c = node.walk();
    node.children(&mut c).any(|ch| ch.kind() == kind)
}
