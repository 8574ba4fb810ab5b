//! Indexer. Orchestrates walk -> parse -> chunk -> embed
//! -> upsert behind the exclusive sync lock. Lives as free functions over
//! explicit `&VectorStore`/`&dyn Embedder` rather than a method on `Engine`
//! directly, so the state machine (`IndexState`) and its unit tests don't
//! need a live store/embedder to exercise the transition logic.

use crate::chunker::chunk_symbol;
use crate::config::Config;
use crate::embedder::{embed_with_retry, Embedder};
use crate::error::CoreError;
use crate::git;
use crate::lock::SyncLock;
use crate::model::CodeChunk;
use crate::parsers;
use crate::scanner::{self, FileEntry};
use crate::store::VectorStore;
use anyhow::Result;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Idle,
    Locking,
    Scanning,
    Indexing,
    Finalizing,
    Snapshotting,
}

/// Pushed to the caller after each batch.
pub type ProgressFn<'a> = dyn FnMut(IndexState, usize, usize) + Send + 'a;

#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub files_considered: usize,
    pub files_indexed: usize,
    pub chunks_upserted: usize,
    pub failed_files: Vec<String>,
    pub commit: String,
}

fn iso_now() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    // Minimal RFC3339 without pulling in a wall-clock calendar dependency
    // beyond what `chrono` already gives us elsewhere in the crate.
    chrono::DateTime::<chrono::Utc>::from_timestamp(secs as i64, 0).map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn file_mtime_iso(path: &Path) -> String {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| chrono::DateTime::<chrono::Utc>::from_timestamp(d.as_secs() as i64, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(iso_now)
}

/// Step 3-4: discover which files to (re)index. Full walk, or — when a
/// previous commit is on record — the incremental `git diff` set,
/// restricted to files that still exist and are code files.
fn discover_targets(repo_root: &Path, last_commit: Option<&str>, head: &str) -> Result<Vec<FileEntry>> {
    let all = scanner::walk(repo_root)?;

    let Some(last) = last_commit else {
        return Ok(all);
    };
    if last == head {
        return Ok(Vec::new());
    }

    match git::diff_name_only(repo_root, last, head) {
        Ok(changed) => {
            let changed: std::collections::HashSet<String> = changed.into_iter().collect();
            Ok(all.into_iter().filter(|f| changed.contains(&f.rel_path)).collect())
        }
        Err(e) => {
            tracing::warn!(error = %e, "git diff failed, falling back to full scan");
            Ok(all)
        }
    }
}

fn git_provenance(repo_root: &Path, rel_path: &str) -> (Option<u32>, Option<u32>, Option<String>) {
    match git::log_follow(repo_root, rel_path) {
        Ok(commits) if !commits.is_empty() => {
            let authors: std::collections::HashSet<&str> = commits.iter().map(|(_, a, _)| a.as_str()).collect();
            let last_date = commits.first().map(|(_, _, d)| d.clone());
            (Some(commits.len() as u32), Some(authors.len() as u32), last_date)
        }
        _ => (None, None, None),
    }
}

/// Parse + chunk one file; never fails the batch.
fn parse_and_chunk_file(repo_root: &Path, entry: &FileEntry, commit: &str, with_git: bool) -> Vec<CodeChunk> {
    let Ok(source) = std::fs::read_to_string(&entry.abs_path) else {
        tracing::warn!(path = %entry.rel_path, "failed to read file, skipping");
        return Vec::new();
    };
    let Some(language) = parsers::language_for_path(Path::new(&entry.rel_path)) else {
        return Vec::new();
    };

    let symbols = parsers::parse(&entry.rel_path, &source);
    let last_modified = file_mtime_iso(&entry.abs_path);

    let (change_count, author_count, last_change_date) = if with_git {
        git_provenance(repo_root, &entry.rel_path)
    } else {
        (None, None, None)
    };

    symbols
        .into_iter()
        .map(|s| {
            let mut chunk = chunk_symbol(s, language, last_modified.clone(), commit.to_string());
            chunk.git_change_count = change_count;
            chunk.git_author_count = author_count;
            chunk.git_last_change_date = last_change_date.clone();
            chunk
        })
        .collect()
}

fn language_aware_sort(entries: Vec<FileEntry>) -> Vec<FileEntry> {
    // Stable order keeps batches deterministic across runs (chunk identity
    // itself doesn't depend on ordering, but progress reporting does).
    entries
}

/// Full orchestration. `with_git_provenance` toggles
/// the per-chunk `git log --follow` enrichment, which is the slowest part
/// of a cold full index and is skippable for tests/dry runs.
pub async fn run_code_index(
    repo_root: &Path,
    store: &VectorStore,
    embedder: &dyn Embedder,
    config: &mut Config,
    with_git_provenance: bool,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Result<IndexReport, CoreError> {
    let _lock = SyncLock::acquire(repo_root).map_err(|_| CoreError::LockContention)?;

    if let Some(p) = progress.as_deref_mut() {
        p(IndexState::Locking, 0, 0);
    }

    let head = git::head_commit(repo_root).unwrap_or_default();

    if let Some(p) = progress.as_deref_mut() {
        p(IndexState::Scanning, 0, 0);
    }
    let targets = language_aware_sort(discover_targets(repo_root, config.last_code_index_commit.as_deref(), &head)?);
    let total = targets.len();

    let mut report = IndexReport { files_considered: total, commit: head.clone(), ..Default::default() };

    for (batch_idx, batch) in targets.chunks(BATCH_SIZE).enumerate() {
        if let Some(p) = progress.as_deref_mut() {
            p(IndexState::Indexing, batch_idx * BATCH_SIZE, total);
        }

        let mut batch_chunks: Vec<(String, Vec<CodeChunk>)> = Vec::new();
        for entry in batch {
            let chunks = parse_and_chunk_file(repo_root, entry, &head, with_git_provenance);
            if chunks.is_empty() {
                tracing::warn!(path = %entry.rel_path, "no symbols extracted");
            }
            batch_chunks.push((entry.rel_path.clone(), chunks));
        }

        let texts: Vec<String> = batch_chunks.iter().flat_map(|(_, cs)| cs.iter().map(|c| c.embedding_text.clone())).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            match embed_with_retry(embedder, &texts).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "embedding batch failed, skipping batch");
                    report.failed_files.extend(batch.iter().map(|f| f.rel_path.clone()));
                    continue;
                }
            }
        };

        let mut cursor = 0usize;
        for (path, mut chunks) in batch_chunks {
            for c in chunks.iter_mut() {
                if let Some(v) = vectors.get(cursor) {
                    c.vector = v.clone();
                }
                cursor += 1;
            }
            if let Err(e) = store.upsert_code_chunks(&path, &chunks).await {
                tracing::warn!(path = %path, error = %e, "failed to upsert chunks for file");
                report.failed_files.push(path);
                continue;
            }
            report.files_indexed += 1;
            report.chunks_upserted += chunks.len();
        }
    }

    if let Some(p) = progress.as_deref_mut() {
        p(IndexState::Finalizing, total, total);
    }
    let _ = store.create_fts_index().await;

    config.last_code_index_commit = Some(head.clone());
    config.save(repo_root).map_err(|e| CoreError::StoreError(e.to_string()))?;

    if let Some(p) = progress.as_deref_mut() {
        p(IndexState::Snapshotting, total, total);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_targets_full_scan_without_prior_commit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn f() {}").unwrap();
        let targets = discover_targets(dir.path(), None, "HEAD").unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn discover_targets_skips_scan_when_commit_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn f() {}").unwrap();
        let targets = discover_targets(dir.path(), Some("abc"), "abc").unwrap();
        assert!(targets.is_empty());
    }
}
