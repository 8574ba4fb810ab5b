//! Co-change analyzer. Mines `git log --name-only` into a
//! file-pair support/confidence model, grounded in the subprocess pattern of
//! `src/git.rs` and the commit-parsing helper it already exposes.

use crate::git;
use std::collections::HashMap;
use std::path::Path;

pub const MIN_SUPPORT: f64 = 0.01;
pub const MIN_CONFIDENCE: f64 = 0.30;

#[derive(Debug, Clone, serde::Serialize)]
pub struct CoChangePair {
    pub file_a: String,
    pub file_b: String,
    pub change_count: u32,
    pub support: f64,
    pub confidence: f64,
}

/// `git log --name-only --since=<daysBack>` parsed into pairwise
/// support/confidence, dropped below the thresholds, sorted by confidence
/// desc.
pub fn analyze_co_change(
    repo_root: &Path,
    days_back: u32,
    min_support: f64,
    min_confidence: f64,
) -> Result<Vec<CoChangePair>, crate::error::CoreError> {
    let since = format!("{days_back}.days.ago");
    let commits = git::log_name_only_since(repo_root, &since)?;

    let total_commits = commits.len().max(1) as f64;
    let mut file_change_counts: HashMap<&str, u32> = HashMap::new();
    let mut pair_counts: HashMap<(String, String), u32> = HashMap::new();

    for (_, files) in &commits {
        for f in files {
            *file_change_counts.entry(f.as_str()).or_insert(0) += 1;
        }
        for i in 0..files.len() {
            for j in (i + 1)..files.len() {
                let (a, b) = if files[i] < files[j] { (&files[i], &files[j]) } else { (&files[j], &files[i]) };
                if a == b {
                    continue;
                }
                *pair_counts.entry((a.clone(), b.clone())).or_insert(0) += 1;
            }
        }
    }

    let mut out = Vec::new();
    for ((a, b), count) in pair_counts {
        let support = count as f64 / total_commits;
        let changes_of_first = file_change_counts.get(a.as_str()).copied().unwrap_or(1).max(1) as f64;
        let confidence = count as f64 / changes_of_first;
        if support < min_support || confidence < min_confidence {
            continue;
        }
        out.push(CoChangePair { file_a: a, file_b: b, change_count: count, support, confidence });
    }

    out.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_have_expected_defaults() {
        assert_eq!(MIN_SUPPORT, 0.01);
        assert_eq!(MIN_CONFIDENCE, 0.30);
    }
}
