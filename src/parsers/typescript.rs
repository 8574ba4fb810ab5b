//! TypeScript/JavaScript driver. Shares one TypeScript grammar for both
//! languages. Handles arrow-function `const` forms, exported constants,
//! method visibility, generics with constraints, and the React-specific
//! `hook`/`component` symbol types.

use crate::model::{Parameter, Symbol, SymbolMetadata, SymbolType, MAX_BODY_CHARS, MAX_CALLS, MAX_IMPORTS};
use crate::parsers::common::*;
use tree_sitter::{Language as TsLanguage, Node, Parser};

const HOOK_CALLS: &[&str] = &["useState", "useEffect", "useCallback", "useMemo"];

pub fn language_for_path(ext: &str) -> TsLanguage {
    if matches!(ext, "tsx" | "jsx") {
        tree_sitter_typescript::language_tsx()
    } else {
        tree_sitter_typescript::language_typescript()
    }
}

fn doc_comment(source: &[u8], node: Node) -> String {
    leading_doc_comment(source, node, &["/**", "*/", "* ", "*", "//"])
}

fn extract_calls(source: &[u8], body: Node, language: TsLanguage) -> Vec<String> {
    let names = run_query_strings(
        source,
        body,
        language,
        r#"(call_expression function: (identifier) @call)
           (call_expression function: (member_expression property: (property_identifier) @call))"#,
        "call",
    )
    .unwrap_or_default();
    dedup_capped(names, MAX_CALLS)
}

fn file_imports(source: &[u8], root: Node, language: TsLanguage) -> Vec<String> {
    let mut out = Vec::new();
    for m in run_matches(source, root, language, r#"(import_statement source: (string) @src) @stmt"#).unwrap_or_default() {
        let src = m.iter().find(|(n, _)| n == "src").map(|(_, node)| strip_string_quotes(node_text(source, *node)));
        let Some(module) = src else { continue };
        let names: Vec<String> = run_query_strings(
            source,
            m.iter().find(|(n, _)| n == "stmt").map(|(_, n)| *n).unwrap_or(root),
            language,
            r#"(import_specifier name: (identifier) @name)
               (namespace_import (identifier) @name)
               (import_clause (identifier) @name)"#,
            "name",
        )
        .unwrap_or_default();
        if names.is_empty() {
            out.push(module);
        } else {
            for n in names {
                out.push(format!("{n}:{module}"));
            }
        }
    }
    dedup_capped(out, MAX_IMPORTS)
}

fn is_exported(node: Node) -> bool {
    node.parent().map(|p| p.kind() == "export_statement").unwrap_or(false)
}

fn outer_node(node: Node) -> Node {
    if is_exported(node) {
        node.parent().unwrap()
    } else {
        node
    }
}

fn generics(source: &[u8], node: Node) -> Vec<String> {
    let Some(params) = node.child_by_field_name("type_parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut c = params.walk();
    for child in params.children(&mut c) {
        if child.kind() == "type_parameter" {
            out.push(node_text(source, child).trim().to_string());
        }
    }
    out
}

fn params_of(source: &[u8], params_node: Option<Node>) -> Vec<Parameter> {
    let Some(params_node) = params_node else { return Vec::new() };
    let mut out = Vec::new();
    let mut c = params_node.walk();
    for child in params_node.children(&mut c) {
        let (pattern_node, variadic) = match child.kind() {
            "required_parameter" | "optional_parameter" => (Some(child), false),
            "rest_pattern" => (Some(child), true),
            "identifier" => (Some(child), false),
            _ => continue,
        };
        let Some(pn) = pattern_node else { continue };
        let name = pn
            .child_by_field_name("pattern")
            .map(|n| node_text(source, n).trim_start_matches("...").to_string())
            .unwrap_or_else(|| node_text(source, pn).trim_start_matches("...").to_string());
        let ty = pn.child_by_field_name("type").map(|n| node_text(source, n).trim_start_matches(':').trim().to_string());
        out.push(Parameter { name, type_: ty, variadic });
    }
    out
}

fn contains_hook_call(source: &[u8], body: Node, language: TsLanguage) -> bool {
    extract_calls(source, body, language).iter().any(|c| HOOK_CALLS.contains(&c.as_str()))
}

fn looks_like_component(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

pub fn parse(path: &str, source_text: &str, ext: &str) -> Vec<Symbol> {
    let language = language_for_path(ext);
    let mut parser = Parser::new();
    if parser.set_language(language).is_err() {
        tracing::warn!(path, "failed to set typescript grammar");
        return Vec::new();
    }
    let Some(tree) = parser.parse(source_text, None) else {
        tracing::warn!(path, "typescript parse failed");
        return Vec::new();
    };
    let source = source_text.as_bytes();
    let root = tree.root_node();
    let imports = file_imports(source, root, language);

    let mut symbols = Vec::new();
    walk(source, path, root, &mut symbols, None, language);
    for s in &mut symbols {
        s.imports = imports.clone();
    }
    symbols
}

fn walk(source: &[u8], path: &str, node: Node, out: &mut Vec<Symbol>, class_name: Option<&str>, language: TsLanguage) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" | "generator_function_declaration" => {
                let Some(name_node) = child.child_by_field_name("name") else { continue };
                push_function(source, path, child, name_node, None, out, language);
            }
            "lexical_declaration" | "variable_declaration" => {
                handle_variable_declaration(source, path, child, out, language);
            }
            "class_declaration" => {
                let Some(name_node) = child.child_by_field_name("name") else { continue };
                let name = node_text(source, name_node).to_string();
                let outer = outer_node(child);
                out.push(Symbol {
                    name: name.clone(),
                    symbol_type: SymbolType::Class,
                    path: path.to_string(),
                    start_line: outer.start_position().row as u32 + 1,
                    end_line: outer.end_position().row as u32 + 1,
                    body: truncate_chars(node_text(source, child), MAX_BODY_CHARS),
                    js_doc: doc_comment(source, outer),
                    calls: Vec::new(),
                    imports: Vec::new(),
                    metadata: SymbolMetadata { generics: generics(source, child), ..Default::default() },
                });
                if let Some(body) = child.child_by_field_name("body") {
                    walk(source, path, body, out, Some(&name), language);
                }
            }
            "method_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    push_function(source, path, child, name_node, class_name, out, language);
                }
            }
            "export_statement" => {
                walk(source, path, child, out, class_name, language);
            }
            _ => {}
        }
    }
}

fn method_visibility(source: &[u8], node: Node) -> Option<String> {
    let mut c = node.walk();
    for child in node.children(&mut c) {
        if child.kind() == "accessibility_modifier" {
            return Some(node_text(source, child).trim().to_string());
        }
    }
    class_name_is_some_default(node)
}

fn class_name_is_some_default(node: Node) -> Option<String> {
    let is_method = node.kind() == "method_definition";
    if is_method {
        Some("public".to_string())
    } else {
        None
    }
}

fn push_function(
    source: &[u8],
    path: &str,
    node: Node,
    name_node: Node,
    class_name: Option<&str>,
    out: &mut Vec<Symbol>,
    language: TsLanguage,
) {
    let base_name = node_text(source, name_node).to_string();
    let full_name = match class_name {
        Some(c) => format!("{c}.{base_name}"),
        None => base_name.clone(),
    };
    let outer = outer_node(node);
    let body = node.child_by_field_name("body").unwrap_or(node);
    let is_async = node
        .children(&mut node.walk())
        .next()
        .map(|n| node_text(source, n) == "async")
        .unwrap_or(false);

    let is_hook_name = base_name.starts_with("use") && base_name.chars().nth(3).map(|c| c.is_uppercase()).unwrap_or(false);
    let symbol_type = if class_name.is_some() {
        SymbolType::Method
    } else if is_hook_name && contains_hook_call(source, body, language) {
        SymbolType::Hook
    } else if looks_like_component(&base_name) && returns_jsx(source, body) {
        SymbolType::Component
    } else {
        SymbolType::Function
    };

    let metadata = SymbolMetadata {
        parameters: params_of(source, node.child_by_field_name("parameters")),
        return_type: node.child_by_field_name("return_type").map(|n| node_text(source, n).trim_start_matches(':').trim().to_string()),
        generics: generics(source, node),
        visibility: method_visibility(source, node),
        is_async,
        hook_deps: if symbol_type == SymbolType::Hook { hook_dependency_array(source, body, language) } else { Vec::new() },
        ..Default::default()
    };

    out.push(Symbol {
        name: full_name,
        symbol_type,
        path: path.to_string(),
        start_line: outer.start_position().row as u32 + 1,
        end_line: outer.end_position().row as u32 + 1,
        body: truncate_chars(node_text(source, body), MAX_BODY_CHARS),
        js_doc: doc_comment(source, outer),
        calls: extract_calls(source, body, language),
        imports: Vec::new(),
        metadata,
    });
}

fn returns_jsx(source: &[u8], body: Node) -> bool {
    !run_query_strings(source, body, body_language_hint(), r#"(jsx_element) @e (jsx_self_closing_element) @e"#, "e")
        .unwrap_or_default()
        .is_empty()
}

/// `returns_jsx`/`hook_dependency_array` only ever see nodes produced by one
/// of the two TS grammars in this file; either's query set matches JSX nodes.
fn body_language_hint() -> TsLanguage {
    tree_sitter_typescript::language_tsx()
}

fn hook_dependency_array(source: &[u8], body: Node, language: TsLanguage) -> Vec<String> {
    // Last array literal argument of a useEffect/useCallback/useMemo call.
    let matches = run_matches(
        source,
        body,
        language,
        r#"(call_expression function: (identifier) @fn arguments: (arguments (array) @deps))"#,
    )
    .unwrap_or_default();
    for m in matches {
        let fn_name = m.iter().find(|(n, _)| n == "fn").map(|(_, n)| node_text(source, *n));
        if !fn_name.map(|n| HOOK_CALLS.contains(&n)).unwrap_or(false) {
            continue;
        }
        if let Some((_, deps_node)) = m.iter().find(|(n, _)| n == "deps") {
            return node_text(source, *deps_node)
                .trim_matches(['[', ']'])
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }
    Vec::new()
}

fn handle_variable_declaration(source: &[u8], path: &str, decl: Node, out: &mut Vec<Symbol>, language: TsLanguage) {
    let mut c = decl.walk();
    for declarator in decl.children(&mut c) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else { continue };
        let name = node_text(source, name_node).to_string();
        let Some(value) = declarator.child_by_field_name("value") else {
            // Exported constant with no function value, e.g. `export const X = 5`.
            if is_exported(decl) {
                push_exported_constant(source, path, decl, &name, out);
            }
            continue;
        };
        if !matches!(value.kind(), "arrow_function" | "function_expression") {
            if is_exported(decl) {
                push_exported_constant(source, path, decl, &name, out);
            }
            continue;
        }
        push_function(source, path, value, name_node, None, out, language);
        // push_function recomputed start/end from `value`'s outer node, which
        // for an arrow function is itself, not the `const` statement; widen it.
        if let Some(last) = out.last_mut() {
            last.start_line = decl.start_position().row as u32 + 1;
            last.end_line = decl.end_position().row as u32 + 1;
        }
    }
}

fn push_exported_constant(source: &[u8], path: &str, decl: Node, name: &str, out: &mut Vec<Symbol>) {
    out.push(Symbol {
        name: name.to_string(),
        symbol_type: SymbolType::Constant,
        path: path.to_string(),
        start_line: decl.start_position().row as u32 + 1,
        end_line: decl.end_position().row as u32 + 1,
        body: truncate_chars(node_text(source, decl), MAX_BODY_CHARS),
        js_doc: doc_comment(source, decl),
        calls: Vec::new(),
        imports: Vec::new(),
        metadata: SymbolMetadata::default(),
    });
}
