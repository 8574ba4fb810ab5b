//! Embedder client contract. The core only defines
//! the batching/retry contract; concrete providers (OpenAI-compatible HTTP,
//! a local model) are collaborators plugged in at `Engine::open`.

use crate::error::CoreError;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub const MAX_RETRIES: u32 = 3;
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const BACKOFF_CAP: Duration = Duration::from_secs(10);
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError>;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let mut out = self.embed_texts(std::slice::from_ref(&text.to_string())).await?;
        out.pop().ok_or(CoreError::ProviderError("empty embedding response".to_string()))
    }

    fn dimensions(&self) -> usize;
}

/// Deterministic local embedder used when no remote provider is configured
///. Hashes n-grams of
/// each text into a fixed-width vector, giving stable, offline vectors.
pub struct LocalHashEmbedder {
    dim: usize,
}

impl LocalHashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for LocalHashEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dim)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}

fn hash_embed(text: &str, dim: usize) -> Vec<f32> {
    use xxhash_rust::xxh3::xxh3_64_with_seed;
    let mut v = vec![0.0f32; dim];
    for (i, word) in text.split_whitespace().enumerate() {
        let h = xxh3_64_with_seed(word.as_bytes(), i as u64);
        let bucket = (h % dim as u64) as usize;
        v[bucket] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

/// Exponential backoff schedule for transient provider failures (429/5xx/
/// timeout/reset).
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(1u32 << attempt.min(8));
    let capped = exp.min(BACKOFF_CAP);
    let jitter_frac = 0.2 * (((attempt * 2654435761) % 1000) as f64 / 1000.0);
    capped.mul_f64(1.0 + jitter_frac)
}

pub async fn embed_with_retry(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
    let mut last_err = None;
    for attempt in 0..=MAX_RETRIES {
        match tokio::time::timeout(CALL_TIMEOUT, embedder.embed_texts(texts)).await {
            Ok(Ok(vectors)) => return Ok(vectors),
            Ok(Err(e)) => last_err = Some(e),
            Err(_) => last_err = Some(CoreError::ProviderError("embedder call timed out".to_string())),
        }
        if attempt < MAX_RETRIES {
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
    }
    Err(last_err.unwrap_or(CoreError::ProviderError("embedder failed".to_string())))
}
