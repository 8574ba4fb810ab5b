//! Multi-signal ranker. Reorders retrieval candidates by a
//! weighted sum of seven pre-normalized signals; never changes the
//! candidate set, only the order (enforced by taking `&[Scored<CodeChunk>]`
//! and returning a same-length re-sort).

use crate::complexity::{complexity_score, cyclomatic_complexity};
use crate::model::{CodeChunk, Scored};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const W_VECTOR: f64 = 0.35;
const W_FTS: f64 = 0.20;
const W_EXACT: f64 = 0.15;
const W_POPULARITY: f64 = 0.15;
const W_FRESHNESS: f64 = 0.05;
const W_COMPLEXITY: f64 = 0.05;
const W_CONTEXT: f64 = 0.05;

/// Missing-signal default.
const NEUTRAL: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct RankContext<'a> {
    pub current_file: Option<&'a str>,
    pub current_directory: Option<&'a str>,
}

/// Rank-position based stand-in for the vector/FTS legs' raw similarity
/// score: LanceDB 0.4's query API surfaces a `_distance` column we don't
/// currently decode, so position within the
/// fetched set is used as the [0,1] proxy, earlier rank scoring higher.
pub fn rank_proxy_score(rank: Option<usize>, fetched: usize) -> f64 {
    match rank {
        Some(r) if fetched > 0 => (1.0 - (r as f64 / fetched as f64)).clamp(0.0, 1.0),
        _ => NEUTRAL,
    }
}

/// `exactMatch` signal: equal 1.0, prefix 0.8,
/// camelCase-initials 0.6, contains 0.5, otherwise 0 (never defaulted to
/// 0.5 — unlike the other six signals, "no match" is a real datum here).
pub fn exact_match_score(symbol: &str, query: &str) -> f64 {
    if query.is_empty() {
        return NEUTRAL;
    }
    let symbol_lower = symbol.to_ascii_lowercase();
    let query_lower = query.to_ascii_lowercase();

    if symbol_lower == query_lower {
        return 1.0;
    }
    if symbol_lower.starts_with(&query_lower) {
        return 0.8;
    }
    if camel_initials_match(symbol, query) {
        return 0.6;
    }
    if symbol_lower.contains(&query_lower) {
        return 0.5;
    }
    0.0
}

fn camel_initials_match(symbol: &str, query: &str) -> bool {
    let initials: String = symbol
        .chars()
        .enumerate()
        .filter(|(i, c)| *i == 0 || c.is_uppercase())
        .map(|(_, c)| c.to_ascii_lowercase())
        .collect();
    !query.is_empty() && initials == query.to_ascii_lowercase()
}

/// `freshnessScore` signal: step function on days since `last_modified`.
pub fn freshness_score(last_modified: &str, now: DateTime<Utc>) -> f64 {
    let Ok(modified) = DateTime::parse_from_rfc3339(last_modified) else {
        return NEUTRAL;
    };
    let days = (now - modified.with_timezone(&Utc)).num_days();
    match days {
        d if d < 7 => 1.0,
        d if d < 30 => 0.8,
        d if d < 90 => 0.5,
        _ => 0.2,
    }
}

/// `popularityScore`: min-max normalized PageRank lookup, defaulting to
/// `NEUTRAL` when no cache entry exists for the symbol.
pub fn popularity_score(symbol: &str, normalized_pagerank: &HashMap<String, f64>) -> f64 {
    normalized_pagerank.get(symbol).copied().unwrap_or(NEUTRAL)
}

/// `contextScore`: same-file bonus 1.0, directory-prefix bonus +0.5,
/// clamped at 1.0, `NEUTRAL` when no context is supplied at all.
pub fn context_score(path: &str, ctx: &RankContext) -> f64 {
    if ctx.current_file.is_none() && ctx.current_directory.is_none() {
        return NEUTRAL;
    }
    let mut score = 0.0;
    if ctx.current_file == Some(path) {
        score = 1.0;
    }
    if let Some(dir) = ctx.current_directory {
        if path.starts_with(dir) {
            score += 0.5;
        }
    }
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Signals {
    pub vector_score: f64,
    pub fts_score: f64,
    pub exact_match: f64,
    pub popularity_score: f64,
    pub freshness_score: f64,
    pub complexity_score: f64,
    pub context_score: f64,
}

pub fn final_score(signals: &Signals) -> f64 {
    (signals.vector_score * W_VECTOR
        + signals.fts_score * W_FTS
        + signals.exact_match * W_EXACT
        + signals.popularity_score * W_POPULARITY
        + signals.freshness_score * W_FRESHNESS
        + signals.complexity_score * W_COMPLEXITY
        + signals.context_score * W_CONTEXT)
        .clamp(0.0, 1.0)
}

/// Recompute `Signals` for one chunk given the auxiliary inputs a ranker
/// pass needs beyond the chunk itself.
pub fn signals_for(
    chunk: &CodeChunk,
    query: &str,
    vector_rank: Option<usize>,
    fts_rank: Option<usize>,
    fetched: usize,
    normalized_pagerank: &HashMap<String, f64>,
    now: DateTime<Utc>,
    ctx: &RankContext,
) -> Signals {
    Signals {
        vector_score: rank_proxy_score(vector_rank, fetched),
        fts_score: rank_proxy_score(fts_rank, fetched),
        exact_match: exact_match_score(&chunk.symbol, query),
        popularity_score: popularity_score(&chunk.symbol, normalized_pagerank),
        freshness_score: freshness_score(&chunk.last_modified, now),
        complexity_score: complexity_score(cyclomatic_complexity(&chunk.body)),
        context_score: context_score(&chunk.path, ctx),
    }
}

/// Re-rank candidates in place by the weighted seven-signal score,
/// preserving the candidate set.
pub fn rerank(
    candidates: Vec<Scored<CodeChunk>>,
    query: &str,
    vector_ranks: &HashMap<String, usize>,
    fts_ranks: &HashMap<String, usize>,
    fetched: usize,
    normalized_pagerank: &HashMap<String, f64>,
    now: DateTime<Utc>,
    ctx: &RankContext,
) -> Vec<Scored<CodeChunk>> {
    let mut rescored: Vec<Scored<CodeChunk>> = candidates
        .into_iter()
        .map(|c| {
            let signals = signals_for(
                &c.chunk,
                query,
                vector_ranks.get(&c.chunk.id).copied(),
                fts_ranks.get(&c.chunk.id).copied(),
                fetched,
                normalized_pagerank,
                now,
                ctx,
            );
            Scored { chunk: c.chunk, score: final_score(&signals) }
        })
        .collect();
    rescored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.chunk.id.cmp(&b.chunk.id)));
    rescored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_equal_scores_one() {
        assert_eq!(exact_match_score("processData", "processData"), 1.0);
    }

    #[test]
    fn prefix_scores_point_eight() {
        assert_eq!(exact_match_score("processDataExtra", "processData"), 0.8);
    }

    #[test]
    fn camel_initials_match_scores_point_six() {
        assert_eq!(exact_match_score("getUserName", "gun"), 0.6);
    }

    #[test]
    fn contains_scores_point_five() {
        assert_eq!(exact_match_score("myProcessDataHelper", "processdata"), 0.5);
    }

    #[test]
    fn no_match_scores_zero() {
        assert_eq!(exact_match_score("unrelated", "processData"), 0.0);
    }

    #[test]
    fn missing_signal_defaults_to_neutral_not_zero() {
        let empty = HashMap::new();
        assert_eq!(popularity_score("unknown", &empty), NEUTRAL);
    }

    #[test]
    fn recent_file_scores_full_freshness() {
        let now = Utc::now();
        let recent = now.to_rfc3339();
        assert_eq!(freshness_score(&recent, now), 1.0);
    }
}
