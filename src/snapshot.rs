//! Snapshot/trends store. Captures a
//! `MetricsSnapshot` from the current insights, scores `healthScore` by a
//! piecewise penalty rule, and classifies per-metric trends against the
//! previous snapshot.

use crate::complexity::cyclomatic_complexity;
use crate::graph::compute_counts;
use crate::insights::{god_symbols, Insights};
use crate::model::{CodeChunk, MetricsSnapshot, Trend};

/// Relative-change threshold for trend classification: `|delta| / max(prev, 1) < 0.05 => stable`.
const TREND_THRESHOLD: f64 = 0.05;

pub fn classify_trend(previous: f64, current: f64) -> Trend {
    let delta = current - previous;
    let denom = previous.max(1.0);
    if (delta.abs() / denom) < TREND_THRESHOLD {
        Trend::Stable
    } else if delta > 0.0 {
        Trend::Up
    } else {
        Trend::Down
    }
}

const TOP_COMPLEX_LIMIT: usize = 10;

fn top_complex_symbols(chunks: &[CodeChunk]) -> Vec<(String, u32)> {
    let mut scored: Vec<(String, u32)> = chunks.iter().map(|c| (c.symbol.clone(), cyclomatic_complexity(&c.body))).collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(TOP_COMPLEX_LIMIT);
    scored
}

fn avg_complexity(chunks: &[CodeChunk]) -> f64 {
    if chunks.is_empty() {
        return 0.0;
    }
    let total: u64 = chunks.iter().map(|c| cyclomatic_complexity(&c.body) as u64).sum();
    total as f64 / chunks.len() as f64
}

fn documentation_coverage(chunks: &[CodeChunk]) -> f64 {
    if chunks.is_empty() {
        return 0.0;
    }
    let documented = chunks.iter().filter(|c| !c.js_doc.trim().is_empty()).count();
    documented as f64 / chunks.len() as f64
}

/// `healthScore` starts at 100 and loses points across five buckets.
/// Thresholds are advisory, never a gate: two similar codebases can land up
/// to ~10 points apart depending on which bucket each falls into — that's
/// an intentional tradeoff, recorded in DESIGN.md.
fn health_score(avg_complexity: f64, doc_coverage: f64, dead_code_ratio: f64, duplicate_ratio: f64, god_symbol_count: usize) -> f64 {
    let mut score = 100.0f64;

    score -= if avg_complexity > 15.0 {
        30.0
    } else if avg_complexity > 10.0 {
        15.0
    } else {
        0.0
    };

    score -= if doc_coverage < 0.3 {
        20.0
    } else if doc_coverage < 0.6 {
        10.0
    } else {
        0.0
    };

    score -= if dead_code_ratio > 0.10 {
        15.0
    } else if dead_code_ratio > 0.05 {
        7.0
    } else {
        0.0
    };

    score -= if duplicate_ratio > 0.05 {
        15.0
    } else if duplicate_ratio > 0.02 {
        7.0
    } else {
        0.0
    };

    score -= if god_symbol_count > 10 {
        20.0
    } else if god_symbol_count > 5 {
        10.0
    } else if god_symbol_count > 0 {
        5.0
    } else {
        0.0
    };

    score.clamp(0.0, 100.0)
}

/// Build the next `MetricsSnapshot` from the current chunk set and
/// `insights`, classifying trends against `previous` (if any). `id` is
/// `timestamp:commitPrefix`.
pub fn capture(chunks: &[CodeChunk], insights: &Insights, commit: &str, timestamp: &str, previous: Option<&MetricsSnapshot>) -> MetricsSnapshot {
    let counts = compute_counts(chunks);
    let total_symbols = chunks.len() as u32;
    let total_files = chunks.iter().map(|c| c.path.as_str()).collect::<std::collections::HashSet<_>>().len() as u32;

    let avg_cx = avg_complexity(chunks);
    let doc_coverage = documentation_coverage(chunks);
    let dead_code_count = insights.dead_code.len() as u32;
    let duplicate_symbol_count: u32 = insights.duplicate_clusters.iter().map(|c| c.members.len() as u32).sum();
    let gods = god_symbols(chunks, &counts);

    let dead_code_ratio = if total_symbols > 0 { dead_code_count as f64 / total_symbols as f64 } else { 0.0 };
    let duplicate_ratio = if total_symbols > 0 { duplicate_symbol_count as f64 / total_symbols as f64 } else { 0.0 };

    let score = health_score(avg_cx, doc_coverage, dead_code_ratio, duplicate_ratio, gods.len());

    let commit_prefix: String = commit.chars().take(8).collect();
    let id = format!("{timestamp}:{commit_prefix}");

    let complexity_trend = previous.map(|p| classify_trend(p.avg_complexity, avg_cx)).unwrap_or(Trend::Stable);
    let dead_code_trend = previous.map(|p| classify_trend(p.dead_code_count as f64, dead_code_count as f64)).unwrap_or(Trend::Stable);
    let doc_coverage_trend = previous.map(|p| classify_trend(p.documentation_coverage, doc_coverage)).unwrap_or(Trend::Stable);

    MetricsSnapshot {
        id,
        timestamp: timestamp.to_string(),
        commit: commit.to_string(),
        total_symbols,
        total_files,
        avg_complexity: avg_cx,
        avg_symbols_per_file: insights.avg_symbols_per_file,
        documentation_coverage: doc_coverage,
        dead_code_count,
        duplicate_symbol_count,
        top_complex_symbols: serde_json::to_string(&top_complex_symbols(chunks)).unwrap_or_default(),
        god_symbols: serde_json::to_string(&gods.iter().map(|g| g.symbol.clone()).collect::<Vec<_>>()).unwrap_or_default(),
        health_score: score,
        complexity_trend,
        dead_code_trend,
        doc_coverage_trend,
    }
}

/// Default retention window for `prune_snapshots`.
pub const RETENTION_DAYS: i64 = 90;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_relative_delta_is_stable_large_is_down() {
        assert_eq!(classify_trend(7.5, 7.2), Trend::Stable);
        assert_eq!(classify_trend(8.5, 7.2), Trend::Down);
    }

    #[test]
    fn trend_up_when_delta_positive_and_large() {
        assert_eq!(classify_trend(5.0, 10.0), Trend::Up);
    }

    #[test]
    fn health_score_is_advisory_not_a_gate() {
        let perfect = health_score(2.0, 0.9, 0.0, 0.0, 0);
        assert_eq!(perfect, 100.0);
        let poor = health_score(20.0, 0.1, 0.2, 0.1, 15);
        assert!(poor < perfect);
        assert!(poor >= 0.0);
    }
}
