//! Engine. Owns the one `VectorStore`
//! connection, the embedding collaborator, config, and the process-local
//! caches, and exposes the read/write API a CLI or any other frontend calls
//! into: a single struct gating the rest of the crate behind a small method
//! surface.

use crate::cache::{RowCountedCache, TtlCache};
use crate::cochange::{self, CoChangePair};
use crate::config::Config;
use crate::embedder::Embedder;
use crate::error::CoreError;
use crate::graph::{self, GraphCounts};
use crate::indexer::{self, IndexReport, ProgressFn};
use crate::insights::{self, Insights};
use crate::model::{CodeChunk, MetricsSnapshot, Scored, SolutionChunk};
use crate::transcript::ParsedCheckpoint;
use crate::pagerank::{self, min_max_normalize};
use crate::ranker::{self, RankContext};
use crate::recommendations::{self, Recommendation};
use crate::retrieval::{self, CodeFilter};
use crate::risk::{self, RiskScore};
use crate::store::VectorStore;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// PageRank and insights are expensive over the full symbol set; both are rebuilt lazily and cached for
/// five minutes or until the row count drifts by more than 50 rows.
const CACHE_TTL: Duration = Duration::from_secs(300);

pub struct Engine {
    repo_root: PathBuf,
    store: VectorStore,
    embedder: Box<dyn Embedder>,
    config: Mutex<Config>,
    pagerank_cache: Mutex<RowCountedCache<HashMap<String, f64>>>,
    insights_cache: Mutex<RowCountedCache<Insights>>,
    recommendations_cache: Mutex<TtlCache<Vec<Recommendation>>>,
}

impl Engine {
    /// Open (or lazily create) `.yep-mem/` under `repo_root`. Fails with
    /// `NotInitialized` only for read-only entry points; `runCodeIndex`
    /// creates the directory on first run.
    pub async fn open(repo_root: &Path, embedder: Box<dyn Embedder>) -> Result<Self, CoreError> {
        let config = Config::load(repo_root).map_err(|e| CoreError::StoreError(e.to_string()))?;
        let store_dir = crate::config::store_dir(repo_root);
        let store = VectorStore::open(&store_dir, config.dimensions).await.map_err(|e| CoreError::StoreError(e.to_string()))?;

        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            store,
            embedder,
            config: Mutex::new(config),
            pagerank_cache: Mutex::new(RowCountedCache::new(CACHE_TTL)),
            insights_cache: Mutex::new(RowCountedCache::new(CACHE_TTL)),
            recommendations_cache: Mutex::new(TtlCache::new(CACHE_TTL)),
        })
    }

    pub fn require_initialized(repo_root: &Path) -> Result<(), CoreError> {
        if Config::is_initialized(repo_root) {
            Ok(())
        } else {
            Err(CoreError::NotInitialized)
        }
    }

    // ---- write path ----------------------------------------------------

    pub async fn run_code_index(&self, with_git_provenance: bool, progress: Option<&mut ProgressFn<'_>>) -> Result<IndexReport, CoreError> {
        let mut config = self.config.lock().unwrap().clone();
        let report = indexer::run_code_index(&self.repo_root, &self.store, self.embedder.as_ref(), &mut config, with_git_provenance, progress).await?;
        *self.config.lock().unwrap() = config;

        self.invalidate_caches();
        self.snapshot_after_index(&report).await;
        Ok(report)
    }

    async fn snapshot_after_index(&self, report: &IndexReport) {
        let chunks = self.store.all_code_chunks().await.unwrap_or_default();
        let counts = graph::compute_counts(&chunks);
        let duplicate_candidates = self.store.code_chunks_with_vectors(chunks.len().max(1)).await.unwrap_or_default();
        let insights = insights::build_insights(&chunks, &duplicate_candidates);
        let _ = counts;

        let previous = self.store.snapshot_history(1).await.ok().and_then(|v| v.into_iter().next());
        let timestamp = Utc::now().to_rfc3339();
        let snap = crate::snapshot::capture(&chunks, &insights, &report.commit, &timestamp, previous.as_ref());
        if let Err(e) = self.store.append_snapshot(&snap).await {
            tracing::warn!(error = %e, "failed to persist metrics snapshot");
        }
    }

    fn invalidate_caches(&self) {
        self.pagerank_cache.lock().unwrap().invalidate();
        self.insights_cache.lock().unwrap().invalidate();
        self.recommendations_cache.lock().unwrap().invalidate();
    }

    // ---- search ---------------------------------------------------------

    pub async fn search_code(&self, query_text: &str, top_k: usize, filter: &CodeFilter, use_ranker: bool) -> Result<Vec<Scored<CodeChunk>>> {
        let vector = self.embedder.embed_text(query_text).await?;
        let candidates = retrieval::search_code(&self.store, Some(query_text), &vector, top_k, filter).await?;
        if !use_ranker {
            return Ok(candidates);
        }

        let pagerank = self.pagerank_scores().await?;
        let fetched = retrieval::fetch_k(top_k);
        let vector_ranks = self.rank_positions(&self.store.code_vector_search(&vector, filter.to_where_expr().as_deref(), fetched).await.unwrap_or_default());
        let fts_ranks = self.rank_positions(&self.store.code_fts_search(query_text, fetched).await.unwrap_or_default());

        let ctx = RankContext { current_file: None, current_directory: None };
        Ok(ranker::rerank(candidates, query_text, &vector_ranks, &fts_ranks, fetched, &pagerank, Utc::now(), &ctx))
    }

    fn rank_positions(&self, chunks: &[CodeChunk]) -> HashMap<String, usize> {
        chunks.iter().enumerate().map(|(i, c)| (c.id.clone(), i)).collect()
    }

    pub async fn search_solutions(&self, query_text: &str, top_k: usize) -> Result<Vec<Scored<SolutionChunk>>> {
        let vector = self.embedder.embed_text(query_text).await?;
        retrieval::search_solutions(&self.store, Some(query_text), &vector, top_k).await
    }

    /// Ingest a parsed checkpoint into one `SolutionChunk` per prompt/response
    /// pair, embedding each and upserting into the `solutions` table.
    pub async fn ingest_checkpoint(&self, checkpoint: &ParsedCheckpoint) -> Result<usize> {
        let mut chunks = crate::chunker::chunk_checkpoint(checkpoint);
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.embedding_text.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;
        for (c, v) in chunks.iter_mut().zip(vectors) {
            c.vector = v;
        }
        self.store.upsert_solutions(&chunks).await?;
        Ok(chunks.len())
    }

    // ---- graph / lookup ---------------------------------------------------

    pub async fn find_callers(&self, name: &str) -> Result<Vec<CodeChunk>> {
        let chunks = self.store.all_code_chunks().await?;
        Ok(graph::find_callers(&chunks, name).into_iter().cloned().collect())
    }

    pub async fn find_callees(&self, name: &str) -> Result<Vec<CodeChunk>> {
        let chunks = self.store.all_code_chunks().await?;
        Ok(graph::find_callees(&chunks, name).into_iter().cloned().collect())
    }

    pub async fn find_importers(&self, name: &str) -> Result<Vec<CodeChunk>> {
        let chunks = self.store.all_code_chunks().await?;
        Ok(graph::find_importers(&chunks, name).into_iter().cloned().collect())
    }

    pub async fn find_symbol_by_name(&self, name: &str) -> Result<Option<CodeChunk>> {
        let chunks = self.store.all_code_chunks().await?;
        Ok(graph::find_symbol_by_name(&chunks, name).cloned())
    }

    pub async fn find_symbols_by_prefix(&self, prefix: &str) -> Result<Vec<CodeChunk>> {
        let chunks = self.store.all_code_chunks().await?;
        Ok(graph::find_symbols_by_prefix(&chunks, prefix).into_iter().cloned().collect())
    }

    pub async fn find_symbols_by_path(&self, path: &str) -> Result<Vec<CodeChunk>> {
        let chunks = self.store.all_code_chunks().await?;
        Ok(graph::find_symbols_by_path(&chunks, path).into_iter().cloned().collect())
    }

    // ---- stats / analytics ------------------------------------------------

    pub async fn get_stats(&self) -> Result<(usize, usize)> {
        Ok((self.store.count_code_symbols().await?, self.store.count_solutions().await?))
    }

    pub async fn get_code_stats(&self) -> Result<GraphCounts> {
        let chunks = self.store.all_code_chunks().await?;
        Ok(graph::compute_counts(&chunks))
    }

    /// PageRank over the caller/callee graph, min-max normalized, cached for
    /// five minutes.
    pub async fn pagerank_scores(&self) -> Result<HashMap<String, f64>> {
        let rows = self.store.count_code_symbols().await.unwrap_or(0);
        if let Some(cached) = self.pagerank_cache.lock().unwrap().get(rows) {
            return Ok(cached);
        }
        let chunks = self.store.all_code_chunks().await?;
        let raw = pagerank::page_rank(&chunks);
        let normalized = min_max_normalize(&raw);
        self.pagerank_cache.lock().unwrap().set(normalized.clone(), rows);
        Ok(normalized)
    }

    pub async fn get_code_insights(&self) -> Result<Insights> {
        let rows = self.store.count_code_symbols().await.unwrap_or(0);
        if let Some(cached) = self.insights_cache.lock().unwrap().get(rows) {
            return Ok(cached);
        }
        let chunks = self.store.all_code_chunks().await?;
        let duplicate_candidates = self.store.code_chunks_with_vectors(chunks.len().max(1)).await.unwrap_or_default();
        let built = insights::build_insights(&chunks, &duplicate_candidates);
        self.insights_cache.lock().unwrap().set(built.clone(), rows);
        Ok(built)
    }

    pub async fn get_recommendations(&self) -> Result<Vec<Recommendation>> {
        if let Some(cached) = self.recommendations_cache.lock().unwrap().get() {
            return Ok(cached);
        }
        let chunks = self.store.all_code_chunks().await?;
        let insights = self.get_code_insights().await?;
        let built = recommendations::recommend(&chunks, &insights);
        self.recommendations_cache.lock().unwrap().set(built.clone());
        Ok(built)
    }

    pub async fn risk_scores(&self) -> Result<Vec<RiskScore>> {
        let chunks = self.store.all_code_chunks().await?;
        Ok(risk::score_all(&chunks))
    }

    pub async fn get_snapshot_history(&self, limit: usize) -> Result<Vec<MetricsSnapshot>> {
        self.store.snapshot_history(limit).await
    }

    pub async fn get_latest_snapshot(&self) -> Result<Option<MetricsSnapshot>> {
        Ok(self.store.snapshot_history(1).await?.into_iter().next())
    }

    pub fn analyze_co_change(&self, days_back: u32) -> Result<Vec<CoChangePair>, CoreError> {
        cochange::analyze_co_change(&self.repo_root, days_back, cochange::MIN_SUPPORT, cochange::MIN_CONFIDENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_ttl_matches_five_minutes() {
        assert_eq!(CACHE_TTL, Duration::from_secs(300));
    }
}
