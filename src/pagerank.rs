//! PageRank engine. Pure iterative computation over the
//! caller→callee graph built from `calls` tokens; the TTL cache lives on
//! `Engine` as a `Cache<K,V>` field rather than a module-level global.

use crate::model::CodeChunk;
use std::collections::HashMap;

pub const DAMPING: f64 = 0.85;
pub const MAX_ITERS: u32 = 20;
pub const EPSILON: f64 = 1e-4;

/// `PR_new(n) = (1-d)/N + d * sum_{m -> n} PR(m) / outDeg(m)`, treating
/// `outDeg(m) = 0` as 1 rather than redistributing.
pub fn page_rank(chunks: &[CodeChunk]) -> HashMap<String, f64> {
    let known: std::collections::HashSet<&str> = chunks.iter().map(|c| c.symbol.as_str()).collect();

    // out_edges[m] = callees of m resolved against known symbols.
    let mut out_edges: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut nodes: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for chunk in chunks {
        let callees: Vec<&str> = chunk.calls_list().into_iter().filter(|c| known.contains(c)).collect();
        if !callees.is_empty() {
            nodes.insert(chunk.symbol.as_str());
            for callee in &callees {
                nodes.insert(callee);
            }
        }
        out_edges.insert(chunk.symbol.as_str(), callees);
    }

    if nodes.is_empty() {
        return HashMap::new();
    }

    // Reverse adjacency: in_edges[n] = list of m with m -> n.
    let mut in_edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for (&m, callees) in &out_edges {
        for &n in callees {
            in_edges.entry(n).or_default().push(m);
        }
    }

    let n = nodes.len() as f64;
    let mut scores: HashMap<&str, f64> = nodes.iter().map(|&s| (s, 1.0 / n)).collect();

    for _ in 0..MAX_ITERS {
        let mut next: HashMap<&str, f64> = HashMap::with_capacity(scores.len());
        let mut max_delta = 0.0f64;

        for &node in &nodes {
            let mut incoming = 0.0;
            if let Some(sources) = in_edges.get(node) {
                for &m in sources {
                    let out_deg = out_edges.get(m).map(|v| v.len()).unwrap_or(0).max(1) as f64;
                    incoming += scores.get(m).copied().unwrap_or(0.0) / out_deg;
                }
            }
            let value = (1.0 - DAMPING) / n + DAMPING * incoming;
            max_delta = max_delta.max((value - scores.get(node).copied().unwrap_or(0.0)).abs());
            next.insert(node, value);
        }

        scores = next;
        if max_delta < EPSILON {
            break;
        }
    }

    scores.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Min-max normalization of the current PageRank map, used by the ranker's
/// `popularityScore` signal.
pub fn min_max_normalize(scores: &HashMap<String, f64>) -> HashMap<String, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let min = scores.values().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    scores
        .iter()
        .map(|(k, &v)| (k.clone(), if range > 0.0 { (v - min) / range } else { 0.5 }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, SymbolType};

    fn chunk(symbol: &str, calls: &str) -> CodeChunk {
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
            imports: String::new(),
            last_modified: String::new(),
            commit: String::new(),
            git_change_count: None,
            git_author_count: None,
            git_last_change_date: None,
            vector: Vec::new(),
        }
    }

    #[test]
    fn popular_callee_outranks_its_callers() {
        // A.calls = B,C ; D.calls = B -- B is called by two distinct symbols.
        let chunks = vec![chunk("A", "B,C"), chunk("B", ""), chunk("C", ""), chunk("D", "B")];
        let scores = page_rank(&chunks);
        assert!(scores["B"] > scores["C"]);
        assert!(scores["B"] > scores["A"]);
    }

    #[test]
    fn scores_sum_close_to_one_without_dangling_nodes() {
        let chunks = vec![chunk("A", "B"), chunk("B", "A")];
        let scores = page_rank(&chunks);
        let sum: f64 = scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }
}
