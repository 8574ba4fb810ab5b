//! Insights engine. Single-pass structural metrics over up
//! to 10 000 `code_symbols` rows, plus LSH-backed duplicate clustering. The
//! TTL+delta cache wrapping this lives on `Engine` (`cache::RowCountedCache`)
//! rather than here — this module is a pure function of a chunk slice.

use crate::graph::{compute_counts, GraphCounts};
use crate::lsh::{cosine_similarity, LshIndex};
use crate::model::{import_head, CodeChunk};
use serde::Serialize;
use std::collections::HashMap;

const HOT_FILES_LIMIT: usize = 15;
const MOST_CONNECTED_LIMIT: usize = 15;
const LARGEST_SYMBOLS_LIMIT: usize = 15;
const DEAD_CODE_LIMIT: usize = 30;
const DUPLICATE_CANDIDATE_LIMIT: usize = 200;
const DUPLICATE_MIN_BODY_LINES: usize = 5;
const DUPLICATE_COSINE_THRESHOLD: f64 = 0.92;
const LSH_SEED: u64 = 0x5EED_C0DE;

#[derive(Debug, Clone, Serialize)]
pub struct DistributionEntry {
    pub key: String,
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolRef {
    pub symbol: String,
    pub path: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCluster {
    pub members: Vec<SymbolRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub language_distribution: Vec<DistributionEntry>,
    pub type_distribution: Vec<DistributionEntry>,
    pub hot_files: Vec<SymbolRef>,
    pub dead_code: Vec<SymbolRef>,
    pub most_connected: Vec<SymbolRef>,
    pub largest_symbols: Vec<SymbolRef>,
    pub avg_symbols_per_file: f64,
    pub duplicate_clusters: Vec<DuplicateCluster>,
    pub fan_in: Vec<SymbolRef>,
    pub cross_directory_imports: u32,
}

fn distribution<'a, I: Iterator<Item = &'a str>>(keys: I, total: usize) -> Vec<DistributionEntry> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for k in keys {
        *counts.entry(k).or_insert(0) += 1;
    }
    let mut out: Vec<DistributionEntry> = counts
        .into_iter()
        .map(|(k, count)| DistributionEntry {
            key: k.to_string(),
            count,
            percentage: if total > 0 { count as f64 / total as f64 * 100.0 } else { 0.0 },
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

fn file_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

fn build_dead_code(chunks: &[CodeChunk], counts: &GraphCounts) -> Vec<SymbolRef> {
    let mut dead: Vec<&CodeChunk> = chunks
        .iter()
        .filter(|c| c.symbol_type.counts_toward_dead_code() && counts.callers(&c.symbol) == 0 && counts.importers(&c.symbol) == 0)
        .collect();
    dead.truncate(DEAD_CODE_LIMIT);
    dead.into_iter().map(|c| SymbolRef { symbol: c.symbol.clone(), path: c.path.clone(), value: 0.0 }).collect()
}

fn build_most_connected(chunks: &[CodeChunk], counts: &GraphCounts) -> Vec<SymbolRef> {
    let mut scored: Vec<(f64, &CodeChunk)> = chunks.iter().map(|c| (counts.connections(&c.symbol) as f64, c)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MOST_CONNECTED_LIMIT);
    scored.into_iter().map(|(v, c)| SymbolRef { symbol: c.symbol.clone(), path: c.path.clone(), value: v }).collect()
}

fn build_fan_in(chunks: &[CodeChunk], counts: &GraphCounts) -> Vec<SymbolRef> {
    let mut scored: Vec<(f64, &CodeChunk)> = chunks.iter().map(|c| (counts.importers(&c.symbol) as f64, c)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MOST_CONNECTED_LIMIT);
    scored.into_iter().filter(|(v, _)| *v > 0.0).map(|(v, c)| SymbolRef { symbol: c.symbol.clone(), path: c.path.clone(), value: v }).collect()
}

/// A symbol whose total connections exceed 3x the median across all
/// indexed symbols, used by snapshot
/// capture's `godSymbols` field and by the recommendations engine.
pub fn god_symbols(chunks: &[CodeChunk], counts: &GraphCounts) -> Vec<SymbolRef> {
    if chunks.is_empty() {
        return Vec::new();
    }
    let mut values: Vec<u32> = chunks.iter().map(|c| counts.connections(&c.symbol)).collect();
    values.sort_unstable();
    let median = values[values.len() / 2] as f64;
    let threshold = median * 3.0;
    if threshold <= 0.0 {
        return Vec::new();
    }
    let mut gods: Vec<SymbolRef> = chunks
        .iter()
        .filter_map(|c| {
            let connections = counts.connections(&c.symbol) as f64;
            (connections > threshold).then(|| SymbolRef { symbol: c.symbol.clone(), path: c.path.clone(), value: connections })
        })
        .collect();
    gods.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
    gods
}

fn build_hot_files(chunks: &[CodeChunk]) -> Vec<SymbolRef> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for c in chunks {
        *counts.entry(c.path.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(HOT_FILES_LIMIT);
    ranked.into_iter().map(|(path, count)| SymbolRef { symbol: String::new(), path: path.to_string(), value: count as f64 }).collect()
}

fn build_largest_symbols(chunks: &[CodeChunk]) -> Vec<SymbolRef> {
    let mut scored: Vec<(usize, &CodeChunk)> = chunks.iter().map(|c| (c.body.lines().count(), c)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(LARGEST_SYMBOLS_LIMIT);
    scored.into_iter().map(|(lines, c)| SymbolRef { symbol: c.symbol.clone(), path: c.path.clone(), value: lines as f64 }).collect()
}

/// Imports whose head resolves to a symbol in a different file's directory
/// than the importing file, a coarse proxy for module-boundary crossing.
fn count_cross_directory_imports(chunks: &[CodeChunk]) -> u32 {
    let dir_by_symbol: HashMap<&str, &str> = chunks.iter().map(|c| (c.symbol.as_str(), file_directory(&c.path))).collect();
    let mut count = 0u32;
    for chunk in chunks {
        let importer_dir = file_directory(&chunk.path);
        for token in chunk.imports_list() {
            let head = import_head(token);
            if let Some(&target_dir) = dir_by_symbol.get(head) {
                if target_dir != importer_dir {
                    count += 1;
                }
            }
        }
    }
    count
}

/// Greedy one-pass LSH clustering: each LSH hit passing the
/// cosine threshold joins its seed's cluster; non-transitive by
/// construction — a candidate already claimed never moves to a later,
/// possibly tighter cluster.
fn cluster_duplicates(candidates: &[(CodeChunk, Vec<f32>)]) -> Vec<DuplicateCluster> {
    let dim = candidates.iter().map(|(_, v)| v.len()).find(|&d| d > 0).unwrap_or(0);
    if dim == 0 || candidates.len() < 2 {
        return Vec::new();
    }

    let vectors: Vec<Vec<f64>> = candidates.iter().map(|(_, v)| v.iter().map(|x| *x as f64).collect()).collect();
    let mut index = LshIndex::new(dim, LSH_SEED);
    for (i, v) in vectors.iter().enumerate() {
        if v.len() == dim {
            index.insert(i, v);
        }
    }

    let mut assigned = vec![false; candidates.len()];
    let mut clusters = Vec::new();

    for seed in 0..candidates.len() {
        if assigned[seed] || vectors[seed].len() != dim {
            continue;
        }
        let mut members = vec![seed];
        for cand in index.candidates(seed, &vectors[seed]) {
            if assigned[cand] || vectors[cand].len() != dim {
                continue;
            }
            if cosine_similarity(&vectors[seed], &vectors[cand]) >= DUPLICATE_COSINE_THRESHOLD {
                members.push(cand);
            }
        }
        if members.len() >= 2 {
            for &m in &members {
                assigned[m] = true;
            }
            clusters.push(DuplicateCluster {
                members: members
                    .into_iter()
                    .map(|i| SymbolRef { symbol: candidates[i].0.symbol.clone(), path: candidates[i].0.path.clone(), value: 0.0 })
                    .collect(),
            });
        }
    }

    clusters.sort_by(|a, b| b.members.len().cmp(&a.members.len()));
    clusters
}

pub fn build_insights(chunks: &[CodeChunk], duplicate_candidates: &[(CodeChunk, Vec<f32>)]) -> Insights {
    let counts = compute_counts(chunks);
    let total = chunks.len();

    let file_count = chunks.iter().map(|c| c.path.as_str()).collect::<std::collections::HashSet<_>>().len().max(1);

    let candidates: Vec<(CodeChunk, Vec<f32>)> = duplicate_candidates
        .iter()
        .filter(|(c, _)| c.body.lines().count() >= DUPLICATE_MIN_BODY_LINES)
        .take(DUPLICATE_CANDIDATE_LIMIT)
        .cloned()
        .collect();

    Insights {
        language_distribution: distribution(chunks.iter().map(|c| c.language.as_str()), total),
        type_distribution: distribution(chunks.iter().map(|c| c.symbol_type.as_str()), total),
        hot_files: build_hot_files(chunks),
        dead_code: build_dead_code(chunks, &counts),
        most_connected: build_most_connected(chunks, &counts),
        largest_symbols: build_largest_symbols(chunks),
        avg_symbols_per_file: (total as f64 / file_count as f64 * 10.0).round() / 10.0,
        duplicate_clusters: cluster_duplicates(&candidates),
        fan_in: build_fan_in(chunks, &counts),
        cross_directory_imports: count_cross_directory_imports(chunks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Language, SymbolType};

    fn chunk(symbol: &str, path: &str, body: &str, calls: &str, imports: &str) -> CodeChunk {
        CodeChunk {
            id: symbol.to_string(),
            path: path.to_string(),
            symbol: symbol.to_string(),
            symbol_type: SymbolType::Function,
            language: Language::Rust,
            body: body.to_string(),
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
    fn dead_code_excludes_callers_and_importers() {
        let chunks = vec![chunk("A", "a.rs", "x", "B", ""), chunk("B", "b.rs", "y", "", ""), chunk("D", "d.rs", "z", "", "B:b")];
        let insights = build_insights(&chunks, &[]);
        let dead_names: Vec<&str> = insights.dead_code.iter().map(|s| s.symbol.as_str()).collect();
        assert!(dead_names.contains(&"A"));
        assert!(!dead_names.contains(&"B"));
    }

    #[test]
    fn duplicate_clustering_groups_near_identical_vectors() {
        let dim = 64;
        let v1: Vec<f32> = (0..dim).map(|i| (i as f32).cos()).collect();
        let v2: Vec<f32> = (0..dim).map(|i| (i as f32 + 0.05).cos()).collect();
        let body = "a\nb\nc\nd\ne\nf\n";
        let candidates = vec![(chunk("dupA", "a.rs", body, "", ""), v1), (chunk("dupB", "b.rs", body, "", ""), v2)];
        let clusters = cluster_duplicates(&candidates);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 2);
    }

    #[test]
    fn cross_directory_imports_counts_only_different_directories() {
        let chunks = vec![
            chunk("Helper", "pkg/a/helper.rs", "x", "", ""),
            chunk("Consumer", "pkg/b/consumer.rs", "y", "", "Helper:pkg/a"),
            chunk("Local", "pkg/a/local.rs", "z", "", "Helper:pkg/a"),
        ];
        assert_eq!(count_cross_directory_imports(&chunks), 1);
    }
}
