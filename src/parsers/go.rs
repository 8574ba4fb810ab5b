//! Go driver: `function_declaration`, `method_declaration`
//! (receiver folded into `Type.Method`, `goReceiverPointer` set for `*T`),
//! `type_declaration` (struct→class, interface→interface, else→type, via a
//! direct `type_spec` or a `type_spec_list`), `const_declaration`/
//! `var_declaration` (direct spec or `*_spec_list`), variadic parameters,
//! doc comments immediately preceding the declaration.

use crate::model::{Parameter, Symbol, SymbolMetadata, SymbolType, MAX_BODY_CHARS, MAX_CALLS, MAX_IMPORTS};
use crate::parsers::common::*;
use tree_sitter::{Language as TsLanguage, Node, Parser};

pub fn language() -> TsLanguage {
    tree_sitter_go::language()
}

fn doc_comment(source: &[u8], node: Node) -> String {
    leading_doc_comment(source, node, &["//"])
}

fn extract_calls(source: &[u8], body: Node) -> Vec<String> {
    let names = run_query_strings(
        source,
        body,
        language(),
        r#"(call_expression function: (identifier) @call)
           (call_expression function: (selector_expression field: (field_identifier) @call))"#,
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
        r#"(import_spec path: (interpreted_string_literal) @path)"#,
        "path",
    )
    .unwrap_or_default();
    dedup_capped(paths.into_iter().map(|s| strip_string_quotes(&s)).collect::<Vec<_>>(), MAX_IMPORTS)
}

fn params_of(source: &[u8], params_node: Option<Node>) -> Vec<Parameter> {
    let Some(params_node) = params_node else { return Vec::new() };
    let mut out = Vec::new();
    let mut c = params_node.walk();
    for child in params_node.children(&mut c) {
        if child.kind() != "parameter_declaration" && child.kind() != "variadic_parameter_declaration" {
            continue;
        }
        let variadic = child.kind() == "variadic_parameter_declaration";
        let name = child
            .child_by_field_name("name")
            .map(|n| node_text(source, n).to_string())
            .unwrap_or_default();
        let ty = child.child_by_field_name("type").map(|n| node_text(source, n).trim().to_string());
        out.push(Parameter { name, type_: ty, variadic });
    }
    out
}

fn push(out: &mut Vec<Symbol>, source: &[u8], path: &str, node: Node, body: Node, name: String, ty: SymbolType, metadata: SymbolMetadata) {
    out.push(Symbol {
        name,
        symbol_type: ty,
        path: path.to_string(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        body: truncate_chars(node_text(source, body), MAX_BODY_CHARS),
        js_doc: doc_comment(source, node),
        calls: extract_calls(source, body),
        imports: Vec::new(),
        metadata,
    });
}

pub fn parse(path: &str, source_text: &str) -> Vec<Symbol> {
    let mut parser = Parser::new();
    if parser.set_language(language()).is_err() {
        tracing::warn!(path, "failed to set go grammar");
        return Vec::new();
    }
    let Some(tree) = parser.parse(source_text, None) else {
        tracing::warn!(path, "go parse failed");
        return Vec::new();
    };
    let source = source_text.as_bytes();
    let root = tree.root_node();
    let imports = file_imports(source, root);

    let mut symbols = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                let Some(name_node) = child.child_by_field_name("name") else { continue };
                let name = node_text(source, name_node).to_string();
                let body = child.child_by_field_name("body").unwrap_or(child);
                let metadata = SymbolMetadata {
                    parameters: params_of(source, child.child_by_field_name("parameters")),
                    return_type: child.child_by_field_name("result").map(|n| node_text(source, n).trim().to_string()),
                    ..Default::default()
                };
                push(&mut symbols, source, path, child, body, name, SymbolType::Function, metadata);
            }
            "method_declaration" => {
                let Some(name_node) = child.child_by_field_name("name") else { continue };
                let base_name = node_text(source, name_node).to_string();
                let receiver = child.child_by_field_name("receiver");
                let (recv_type, is_pointer) = receiver
                    .and_then(|r| r.named_child(0))
                    .map(|param| {
                        let ty_node = param.child_by_field_name("type");
                        let ty_text = ty_node.map(|n| node_text(source, n).trim().to_string()).unwrap_or_default();
                        let is_ptr = ty_text.starts_with('*');
                        (ty_text.trim_start_matches('*').to_string(), is_ptr)
                    })
                    .unwrap_or_default();
                let name = if recv_type.is_empty() {
                    base_name
                } else {
                    format!("{recv_type}.{base_name}")
                };
                let body = child.child_by_field_name("body").unwrap_or(child);
                let metadata = SymbolMetadata {
                    parameters: params_of(source, child.child_by_field_name("parameters")),
                    return_type: child.child_by_field_name("result").map(|n| node_text(source, n).trim().to_string()),
                    go_receiver_pointer: is_pointer,
                    ..Default::default()
                };
                push(&mut symbols, source, path, child, body, name, SymbolType::Method, metadata);
            }
            "type_declaration" => {
                collect_type_specs(child, source, path, &mut symbols);
            }
            "const_declaration" | "var_declaration" => {
                let is_const = child.kind() == "const_declaration";
                collect_value_specs(child, source, path, is_const, &mut symbols);
            }
            _ => {}
        }
    }

    for s in &mut symbols {
        s.imports = imports.clone();
    }
    symbols
}

fn collect_type_specs(decl: Node, source: &[u8], path: &str, out: &mut Vec<Symbol>) {
    let mut c = decl.walk();
    for child in decl.children(&mut c) {
        match child.kind() {
            "type_spec" => push_type_spec(child, source, path, decl, out),
            "type_spec_list" => {
                let mut c2 = child.walk();
                for spec in child.children(&mut c2) {
                    if spec.kind() == "type_spec" {
                        push_type_spec(spec, source, path, decl, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_type_spec(spec: Node, source: &[u8], path: &str, decl_node: Node, out: &mut Vec<Symbol>) {
    let Some(name_node) = spec.child_by_field_name("name") else { return };
    let name = node_text(source, name_node).to_string();
    let underlying = spec.child_by_field_name("type");
    let symbol_type = match underlying.map(|n| n.kind()) {
        Some("struct_type") => SymbolType::Class,
        Some("interface_type") => SymbolType::Interface,
        _ => SymbolType::Type,
    };
    out.push(Symbol {
        name,
        symbol_type,
        path: path.to_string(),
        start_line: decl_node.start_position().row as u32 + 1,
        end_line: spec.end_position().row as u32 + 1,
        body: truncate_chars(node_text(source, spec), MAX_BODY_CHARS),
        js_doc: doc_comment(source, decl_node),
        calls: Vec::new(),
        imports: Vec::new(),
        metadata: SymbolMetadata::default(),
    });
}

fn collect_value_specs(decl: Node, source: &[u8], path: &str, is_const: bool, out: &mut Vec<Symbol>) {
    let mut c = decl.walk();
    for child in decl.children(&mut c) {
        match child.kind() {
            "const_spec" | "var_spec" => push_value_spec(child, source, path, decl, is_const, out),
            "const_spec_list" | "var_spec_list" => {
                let mut c2 = child.walk();
                for spec in child.children(&mut c2) {
                    if matches!(spec.kind(), "const_spec" | "var_spec") {
                        push_value_spec(spec, source, path, decl, is_const, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_value_spec(spec: Node, source: &[u8], path: &str, decl_node: Node, is_const: bool, out: &mut Vec<Symbol>) {
    let Some(names) = spec.child_by_field_name("name") else { return };
    let name = node_text(source, names).to_string();
    if name.is_empty() {
        return;
    }
    out.push(Symbol {
        name,
        symbol_type: if is_const { SymbolType::Constant } else { SymbolType::Variable },
        path: path.to_string(),
        start_line: decl_node.start_position().row as u32 + 1,
        end_line: spec.end_position().row as u32 + 1,
        body: truncate_chars(node_text(source, spec), MAX_BODY_CHARS),
        js_doc: doc_comment(source, decl_node),
        calls: Vec::new(),
        imports: Vec::new(),
        metadata: SymbolMetadata::default(),
    });
}
