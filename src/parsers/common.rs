//! Tree-sitter query plumbing shared by all language drivers: runs a query
//! against a parsed tree and returns raw capture text. Each driver builds
//! its own `model::Symbol` from the pieces.

use anyhow::{Context, Result};
use tree_sitter::{Language, Node, Query, QueryCursor};

pub fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    std::str::from_utf8(&source[node.start_byte()..node.end_byte()]).unwrap_or("")
}

/// All capture groups for every match of `query_src`, as a map from capture
/// name to node, one `Vec` per match (so callers can correlate captures
/// within the same match — e.g. a function's `name` and `params` together).
pub fn run_matches<'a>(
    source: &'a [u8],
    root: Node<'a>,
    language: Language,
    query_src: &str,
) -> Result<Vec<Vec<(String, Node<'a>)>>> {
    let query = Query::new(language, query_src).context("compiling tree-sitter query")?;
    let mut cursor = QueryCursor::new();
    let names = query.capture_names().to_vec();

    let mut out = Vec::new();
    for m in cursor.matches(&query, root, source) {
        let mut captures = Vec::new();
        for cap in m.captures {
            captures.push((names[cap.index as usize].clone(), cap.node));
        }
        out.push(captures);
    }
    Ok(out)
}

pub fn run_query_strings(source: &[u8], root: Node, language: Language, query_src: &str, cap: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for m in run_matches(source, root, language, query_src)? {
        for (name, node) in m {
            if name == cap {
                let text = node_text(source, node).trim().to_string();
                if !text.is_empty() {
                    out.push(text);
                }
            }
        }
    }
    Ok(out)
}

pub fn strip_string_quotes(s: &str) -> String {
    let t = s.trim();
    if t.len() >= 2 {
        let bytes = t.as_bytes();
        let (first, last) = (bytes[0], bytes[t.len() - 1]);
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') || (first == b'`' && last == b'`') {
            return t[1..t.len() - 1].to_string();
        }
    }
    t.to_string()
}

/// Dedup while preserving first-seen order, capped at `max` (used to bound
/// `calls`/`imports` to at most 30 distinct entries).
pub fn dedup_capped(items: impl IntoIterator<Item = String>, max: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if item.is_empty() || !seen.insert(item.clone()) {
            continue;
        }
        out.push(item);
        if out.len() >= max {
            break;
        }
    }
    out
}

/// The doc-comment lines immediately preceding `node` (no blank-line gap),
/// stripped of comment syntax. Shared across Go/Rust (`//`, `///`) drivers.
pub fn leading_doc_comment(source: &[u8], node: Node, line_prefixes: &[&str]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut cursor = node;
    while let Some(prev) = cursor.prev_sibling() {
        let kind = prev.kind();
        if kind != "line_comment" && kind != "comment" {
            break;
        }
        let text = node_text(source, prev).trim();
        let stripped = line_prefixes
            .iter()
            .find_map(|p| text.strip_prefix(p))
            .unwrap_or(text)
            .trim();
        lines.push(stripped.to_string());
        cursor = prev;
    }
    lines.reverse();
    lines.join("\n")
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
