//! Recommendations engine. Ships the rule-based path only; an LLM-backed
//! path could plug in behind the same contract, but no flag is wired here
//! since no LLM client exists in this crate.

use crate::insights::Insights;
use crate::risk::{score_all, RiskLevel};
use crate::model::CodeChunk;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub title: String,
    pub detail: String,
}

/// Rule-based pass over the current insights and risk scores. Every rule is
/// independent and order-preserving by priority desc, so adding a rule never
/// reshuffles unrelated recommendations.
pub fn recommend(chunks: &[CodeChunk], insights: &Insights) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if !insights.dead_code.is_empty() {
        out.push(Recommendation {
            priority: if insights.dead_code.len() > 10 { Priority::High } else { Priority::Medium },
            title: format!("{} unreferenced symbol(s) found", insights.dead_code.len()),
            detail: insights.dead_code.iter().take(5).map(|s| s.symbol.as_str()).collect::<Vec<_>>().join(", "),
        });
    }

    if !insights.duplicate_clusters.is_empty() {
        let total_members: usize = insights.duplicate_clusters.iter().map(|c| c.members.len()).sum();
        out.push(Recommendation {
            priority: Priority::Medium,
            title: format!("{} duplicate cluster(s) covering {} symbols", insights.duplicate_clusters.len(), total_members),
            detail: "near-identical bodies (cosine >= 0.92) are candidates for extraction".to_string(),
        });
    }

    let risks = score_all(chunks);
    let critical: Vec<_> = risks.iter().filter(|r| r.level == RiskLevel::Critical).take(5).collect();
    if !critical.is_empty() {
        out.push(Recommendation {
            priority: Priority::High,
            title: format!("{} symbol(s) at critical bug-risk", critical.len()),
            detail: critical.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>().join(", "),
        });
    }

    if insights.cross_directory_imports as usize > insights.hot_files.len() * 5 {
        out.push(Recommendation {
            priority: Priority::Low,
            title: "high cross-directory import fan-out".to_string(),
            detail: format!("{} imports cross a directory boundary", insights.cross_directory_imports),
        });
    }

    out.sort_by(|a, b| b.priority.cmp(&a.priority));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::build_insights;
    use crate::model::{Language, SymbolType};

    fn chunk(symbol: &str) -> CodeChunk {
        CodeChunk {
            id: symbol.to_string(),
            path: "a.rs".to_string(),
            symbol: symbol.to_string(),
            symbol_type: SymbolType::Function,
            language: Language::Rust,
            body: "x".to_string(),
            summary: String::new(),
            embedding_text: String::new(),
            start_line: 1,
            end_line: 2,
            js_doc: String::new(),
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
    fn dead_code_produces_a_recommendation() {
        let chunks = vec![chunk("A")];
        let insights = build_insights(&chunks, &[]);
        let recs = recommend(&chunks, &insights);
        assert!(recs.iter().any(|r| r.title.contains("unreferenced")));
    }

    #[test]
    fn recommendations_sorted_by_priority_desc() {
        let chunks = vec![chunk("A"), chunk("B")];
        let insights = build_insights(&chunks, &[]);
        let recs = recommend(&chunks, &insights);
        for w in recs.windows(2) {
            assert!(w[0].priority >= w[1].priority);
        }
    }
}
