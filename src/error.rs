//! Closed error taxonomy. Internal components use `anyhow::Result`
//! for context-chaining; boundaries exposed to callers (the public API, the
//! CLI) map those into this enum so matching doesn't require string parsing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("yep-mem is not initialized in this repository (missing .yep-mem/)")]
    NotInitialized,

    #[error("another index run holds the sync lock")]
    LockContention,

    #[error("embedding provider failed: {0}")]
    ProviderError(String),

    #[error("failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("vector store error: {0}")]
    StoreError(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("not found")]
    NotFound,

    #[error("git command failed: {0}")]
    TransientGitError(String),
}

impl CoreError {
    /// Exit code contract: 0 success (not represented here), 1
    /// initialization errors, 2 lock contention, everything else 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::NotInitialized => 1,
            CoreError::LockContention => 2,
            _ => 1,
        }
    }
}
