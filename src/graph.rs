//! Graph analyzer. Builds caller/callee/importer views from
//! the `calls`/`imports` columns of `code_symbols`. Uses the typed
//! `split_csv`/`import_head` helpers instead of `LIKE '%name%'` substring
//! matching, so a short name like `do` cannot falsely match inside an
//! unrelated token.

use crate::model::{import_head, split_csv, CodeChunk};
use std::collections::HashMap;

pub const GRAPH_SCAN_LIMIT: usize = 10_000;
pub const POINT_QUERY_LIMIT: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct GraphCounts {
    pub caller_counts: HashMap<String, u32>,
    pub importer_counts: HashMap<String, u32>,
    pub callee_counts: HashMap<String, u32>,
}

/// Single scan over (at most `GRAPH_SCAN_LIMIT`) chunks building all three
/// views at once, computed on demand rather than incrementally maintained.
pub fn compute_counts(chunks: &[CodeChunk]) -> GraphCounts {
    let known_symbols: std::collections::HashSet<&str> = chunks.iter().map(|c| c.symbol.as_str()).collect();
    let mut counts = GraphCounts::default();

    for chunk in chunks.iter().take(GRAPH_SCAN_LIMIT) {
        let calls = chunk.calls_list();
        counts.callee_counts.insert(chunk.symbol.clone(), calls.len() as u32);

        for callee in &calls {
            if known_symbols.contains(callee) {
                *counts.caller_counts.entry(callee.to_string()).or_insert(0) += 1;
            }
        }

        for import in chunk.imports_list() {
            let head = import_head(import);
            if known_symbols.contains(head) {
                *counts.importer_counts.entry(head.to_string()).or_insert(0) += 1;
            }
        }
    }

    counts
}

impl GraphCounts {
    pub fn callers(&self, symbol: &str) -> u32 {
        self.caller_counts.get(symbol).copied().unwrap_or(0)
    }

    pub fn importers(&self, symbol: &str) -> u32 {
        self.importer_counts.get(symbol).copied().unwrap_or(0)
    }

    pub fn callees(&self, symbol: &str) -> u32 {
        self.callee_counts.get(symbol).copied().unwrap_or(0)
    }

    pub fn connections(&self, symbol: &str) -> u32 {
        self.callers(symbol) + self.callees(symbol) + self.importers(symbol)
    }
}

fn token_matches(tokens: &[&str], symbol: &str) -> bool {
    tokens.iter().any(|t| *t == symbol)
}

/// Symbols whose `calls` contains `name` as a token, capped at
/// `POINT_QUERY_LIMIT`.
pub fn find_callers<'a>(chunks: &'a [CodeChunk], name: &str) -> Vec<&'a CodeChunk> {
    chunks
        .iter()
        .filter(|c| token_matches(&c.calls_list(), name))
        .take(POINT_QUERY_LIMIT)
        .collect()
}

/// The named symbol's own callee chunks, resolved against the indexed set.
pub fn find_callees<'a>(chunks: &'a [CodeChunk], name: &str) -> Vec<&'a CodeChunk> {
    let Some(source) = chunks.iter().find(|c| c.symbol == name) else {
        return Vec::new();
    };
    let callees = source.calls_list();
    chunks
        .iter()
        .filter(|c| callees.contains(&c.symbol.as_str()))
        .take(POINT_QUERY_LIMIT)
        .collect()
}

/// Chunks whose file `imports` a token whose head equals `name`.
pub fn find_importers<'a>(chunks: &'a [CodeChunk], name: &str) -> Vec<&'a CodeChunk> {
    chunks
        .iter()
        .filter(|c| c.imports_list().iter().any(|t| import_head(t) == name))
        .take(POINT_QUERY_LIMIT)
        .collect()
}

pub fn find_symbol_by_name<'a>(chunks: &'a [CodeChunk], name: &str) -> Option<&'a CodeChunk> {
    chunks.iter().find(|c| c.symbol == name)
}

pub fn find_symbols_by_prefix<'a>(chunks: &'a [CodeChunk], prefix: &str) -> Vec<&'a CodeChunk> {
    chunks.iter().filter(|c| c.symbol.starts_with(prefix)).take(POINT_QUERY_LIMIT).collect()
}

pub fn find_symbols_by_path<'a>(chunks: &'a [CodeChunk], path: &str) -> Vec<&'a CodeChunk> {
    chunks.iter().filter(|c| c.path == path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, SymbolType};

    fn chunk(symbol: &str, calls: &str, imports: &str) -> CodeChunk {
        CodeChunk {
            id: symbol.to_string(),
            path: "a.rs".to_string(),
            symbol: symbol.to_string(),
            symbol_type: SymbolType::Function,
            language: Language::Rust,
            body: String::new(),
            summary: String::new(),
            embedding_text: String::new(),
            start_line: 1,
            end_line: 2,
            js_doc: String::new(),
            calls: calls.to_string(),
            imports: imports.to_string(),
            last_modified: String::new(),
            commit: String::new(),
            git_change_count: None,
            git_author_count: None,
            git_last_change_date: None,
            vector: Vec::new(),
        }
    }

    #[test]
    fn caller_counts_do_not_false_match_substrings() {
        let chunks = vec![chunk("do", "", ""), chunk("undo", "do", "")];
        let counts = compute_counts(&chunks);
        assert_eq!(counts.callers("do"), 1);
    }

    #[test]
    fn dead_code_has_zero_callers_and_importers() {
        let chunks = vec![chunk("A", "B,C", ""), chunk("B", "", ""), chunk("D", "B", "")];
        let counts = compute_counts(&chunks);
        assert!(counts.callers("B") == 2);
        assert!(counts.callers("A") == 0 && counts.importers("A") == 0);
    }
}
