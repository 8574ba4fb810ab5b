//! Risk analyzer. Per-chunk bug-risk score from six
//! weighted sub-scores, each bucketed into [0,1] before weighting.

use crate::complexity::cyclomatic_complexity;
use crate::model::CodeChunk;

const W_COMPLEXITY: f64 = 0.25;
const W_CHANGE_FREQUENCY: f64 = 0.20;
const W_AUTHOR_CHURN: f64 = 0.15;
const W_LINE_COUNT: f64 = 0.15;
const W_TEST_COVERAGE: f64 = 0.15;
const W_DOCUMENTATION: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 40.0 {
            RiskLevel::Low
        } else if score < 60.0 {
            RiskLevel::Medium
        } else if score < 80.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskScore {
    pub symbol: String,
    pub path: String,
    pub score: f64,
    pub level: RiskLevel,
}

fn bucketed_change_frequency(change_count: u32) -> f64 {
    match change_count {
        0..=2 => 0.1,
        3..=5 => 0.3,
        6..=10 => 0.5,
        11..=20 => 0.8,
        _ => 1.0,
    }
}

fn bucketed_author_churn(author_count: u32) -> f64 {
    match author_count {
        0..=1 => 0.1,
        2..=3 => 0.4,
        4..=6 => 0.7,
        _ => 1.0,
    }
}

fn bucketed_line_count(lines: usize) -> f64 {
    match lines {
        0..=30 => 0.1,
        31..=80 => 0.3,
        81..=150 => 0.5,
        151..=300 => 0.8,
        _ => 1.0,
    }
}

fn bucketed_complexity(complexity: u32) -> f64 {
    match complexity {
        0..=5 => 0.1,
        6..=10 => 0.3,
        11..=15 => 0.5,
        16..=20 => 0.8,
        _ => 1.0,
    }
}

fn documentation_score(chunk: &CodeChunk) -> f64 {
    if !chunk.js_doc.trim().is_empty() {
        0.1
    } else if !chunk.summary.trim().is_empty() {
        0.3
    } else {
        1.0
    }
}

/// Risk score for one chunk, scaled to 0-100. `test_coverage`
/// is unknown to the core and defaults to 0.5 per the ranker's "never 0"
/// rule for missing signals.
pub fn score_chunk(chunk: &CodeChunk) -> RiskScore {
    let complexity = bucketed_complexity(cyclomatic_complexity(&chunk.body));
    let change_frequency = bucketed_change_frequency(chunk.git_change_count.unwrap_or(0));
    let author_churn = bucketed_author_churn(chunk.git_author_count.unwrap_or(0));
    let line_count = bucketed_line_count(chunk.body.lines().count());
    let test_coverage = 0.5;
    let documentation = documentation_score(chunk);

    let weighted = complexity * W_COMPLEXITY
        + change_frequency * W_CHANGE_FREQUENCY
        + author_churn * W_AUTHOR_CHURN
        + line_count * W_LINE_COUNT
        + test_coverage * W_TEST_COVERAGE
        + documentation * W_DOCUMENTATION;

    let score = (weighted * 100.0).clamp(0.0, 100.0);

    RiskScore { symbol: chunk.symbol.clone(), path: chunk.path.clone(), score, level: RiskLevel::from_score(score) }
}

pub fn score_all(chunks: &[CodeChunk]) -> Vec<RiskScore> {
    let mut out: Vec<RiskScore> = chunks.iter().map(score_chunk).collect();
    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, SymbolType};

    fn chunk(body: &str, js_doc: &str) -> CodeChunk {
        CodeChunk {
            id: "x".to_string(),
            path: "a.rs".to_string(),
            symbol: "f".to_string(),
            symbol_type: SymbolType::Function,
            language: Language::Rust,
            body: body.to_string(),
            summary: String::new(),
            embedding_text: String::new(),
            start_line: 1,
            end_line: 2,
            js_doc: js_doc.to_string(),
            calls: String::new(),
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
    fn undocumented_complex_symbol_scores_higher_than_documented_simple_one() {
        let complex = chunk(&"if a {}\n".repeat(20), "");
        let simple = chunk("return 1;", "/// does a thing");
        assert!(score_chunk(&complex).score > score_chunk(&simple).score);
    }

    #[test]
    fn level_thresholds_bucket_correctly() {
        assert_eq!(RiskLevel::from_score(39.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(59.9), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(79.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80.0), RiskLevel::Critical);
    }
}
