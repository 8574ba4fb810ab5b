//! Hybrid retrieval engine. Vector KNN + FTS + exact-name legs, fused by
//! Reciprocal-Rank Fusion, against LanceDB for vectors and tantivy for
//! full-text.

use crate::model::{CodeChunk, Language, Scored, SolutionChunk, SymbolType};
use crate::store::{sql_quote, quote_ident, VectorStore};
use anyhow::Result;
use std::collections::HashMap;

pub const RRF_K: f64 = 60.0;
pub const EXACT_BOOST_STRONG: f64 = 0.5;
pub const EXACT_BOOST_WEAK: f64 = 0.2;

pub fn fetch_k(top_k: usize) -> usize {
    (top_k * 3).max(30)
}

#[derive(Debug, Clone, Default)]
pub struct CodeFilter {
    pub language: Option<Language>,
    pub symbol_type: Option<SymbolType>,
    pub path_substring: Option<String>,
}

impl CodeFilter {
    pub fn to_where_expr(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(lang) = self.language {
            clauses.push(format!("{} = '{}'", quote_ident("language"), sql_quote(lang.as_str())));
        }
        if let Some(st) = self.symbol_type {
            clauses.push(format!("{} = '{}'", quote_ident("symbolType"), sql_quote(st.as_str())));
        }
        if let Some(p) = &self.path_substring {
            clauses.push(format!("{} LIKE '%{}%'", quote_ident("path"), sql_quote(p)));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }
}

/// Boost applied to an exact-name hit: the stronger boost
/// fires for an exact match or a `.suffix` match (qualified method name),
/// the weaker one for the `LIKE 'q%'` prefix leg.
fn exact_boost(symbol: &str, query: &str) -> f64 {
    let symbol_lower = symbol.to_ascii_lowercase();
    let query_lower = query.to_ascii_lowercase();
    if symbol_lower == query_lower || symbol_lower.ends_with(&format!(".{query_lower}")) {
        EXACT_BOOST_STRONG
    } else {
        EXACT_BOOST_WEAK
    }
}

/// Fuse up to three ranked id lists into one score map via RRF with `K=60`.
/// `exact` carries `(id, boost)` pairs already computed by the caller so
/// this function stays agnostic to what "exact" means for a given table.
fn rrf_fuse(vector_ids: &[String], fts_ids: &[String], exact: Option<&[(String, f64)]>) -> HashMap<String, f64> {
    let mut scores: HashMap<String, f64> = HashMap::new();

    for (rank, id) in vector_ids.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (RRF_K + rank as f64 + 1.0);
    }
    for (rank, id) in fts_ids.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (RRF_K + rank as f64 + 1.0);
    }
    if let Some(exact) = exact {
        for (rank, (id, boost)) in exact.iter().enumerate() {
            *scores.entry(id.clone()).or_insert(0.0) += boost + 1.0 / (RRF_K + rank as f64 + 1.0);
        }
    }

    scores
}

/// Stable ordering: score desc, then `id` asc.
fn sort_and_truncate(mut scored: Vec<(String, f64)>, top_k: usize) -> Vec<(String, f64)> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(top_k);
    scored
}

/// Hybrid code-symbol search: vector leg always runs; FTS and
/// exact-name legs only run when `query_text` is present. A failing leg is
/// logged and treated as empty, never fatal (exact-match runs "in parallel"
/// conceptually with the other two — here sequentially, since none block on
/// each other's results).
pub async fn search_code(
    store: &VectorStore,
    query_text: Option<&str>,
    query_vector: &[f32],
    top_k: usize,
    filter: &CodeFilter,
) -> Result<Vec<Scored<CodeChunk>>> {
    let k = fetch_k(top_k);
    let where_expr = filter.to_where_expr();

    let rv = match store.code_vector_search(query_vector, where_expr.as_deref(), k).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "vector leg failed, continuing without it");
            Vec::new()
        }
    };

    let (rf, re) = if let Some(q) = query_text {
        let rf = store.code_fts_search(q, k).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "fts leg failed, continuing without it");
            Vec::new()
        });
        let re = store.code_exact_name(q, k).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "exact-name leg failed, continuing without it");
            Vec::new()
        });
        (rf, re)
    } else {
        (Vec::new(), Vec::new())
    };

    let mut by_id: HashMap<String, CodeChunk> = HashMap::new();
    for c in rv.iter().chain(rf.iter()).chain(re.iter()) {
        by_id.entry(c.id.clone()).or_insert_with(|| c.clone());
    }

    let rv_ids: Vec<String> = rv.iter().map(|c| c.id.clone()).collect();
    let rf_ids: Vec<String> = rf.iter().map(|c| c.id.clone()).collect();
    let exact: Option<Vec<(String, f64)>> = query_text.map(|q| re.iter().map(|c| (c.id.clone(), exact_boost(&c.symbol, q))).collect());

    let scores = rrf_fuse(&rv_ids, &rf_ids, exact.as_deref());
    let ordered = sort_and_truncate(scores.into_iter().collect(), top_k);

    Ok(ordered.into_iter().filter_map(|(id, score)| by_id.get(&id).map(|c| Scored { chunk: c.clone(), score })).collect())
}

/// Hybrid session search: same RRF recipe
/// without the exact-name leg, with `queryText` driving the FTS leg.
pub async fn search_solutions(store: &VectorStore, query_text: Option<&str>, query_vector: &[f32], top_k: usize) -> Result<Vec<Scored<SolutionChunk>>> {
    let k = fetch_k(top_k);

    let rv = store.solutions_vector_search(query_vector, k).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "vector leg failed, continuing without it");
        Vec::new()
    });
    let rf = match query_text {
        Some(q) => store.solutions_fts_search(q, k).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "fts leg failed, continuing without it");
            Vec::new()
        }),
        None => Vec::new(),
    };

    let mut by_id: HashMap<String, SolutionChunk> = HashMap::new();
    for c in rv.iter().chain(rf.iter()) {
        by_id.entry(c.id.clone()).or_insert_with(|| c.clone());
    }

    let rv_ids: Vec<String> = rv.iter().map(|c| c.id.clone()).collect();
    let rf_ids: Vec<String> = rf.iter().map(|c| c.id.clone()).collect();

    let scores = rrf_fuse(&rv_ids, &rf_ids, None);
    let ordered = sort_and_truncate(scores.into_iter().collect(), top_k);

    Ok(ordered.into_iter().filter_map(|(id, score)| by_id.get(&id).map(|c| Scored { chunk: c.clone(), score })).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_monotone_when_a_outranks_b_everywhere() {
        let vector_ids = vec!["a".to_string(), "b".to_string()];
        let fts_ids = vec!["a".to_string(), "b".to_string()];
        let scores = rrf_fuse(&vector_ids, &fts_ids, None);
        assert!(scores["a"] > scores["b"]);
    }

    #[test]
    fn exact_match_dominates() {
        let exact = vec![("a".to_string(), exact_boost("processData", "processData"))];
        let scores = rrf_fuse(&[], &[], Some(&exact));
        let expected = EXACT_BOOST_STRONG + 1.0 / (RRF_K + 1.0);
        assert!((scores["a"] - expected).abs() < 1e-9);
    }

    #[test]
    fn suffix_match_gets_strong_boost() {
        assert_eq!(exact_boost("User.GetName", "getname"), EXACT_BOOST_STRONG);
        assert_eq!(exact_boost("processDataExtra", "processdata"), EXACT_BOOST_WEAK);
    }

    #[test]
    fn tie_break_prefers_lower_id() {
        let ordered = sort_and_truncate(vec![("b".to_string(), 1.0), ("a".to_string(), 1.0)], 2);
        assert_eq!(ordered[0].0, "a");
    }
}
