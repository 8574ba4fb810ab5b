//! `.yep-mem/config.json`: a `load`/`Default` pattern that also persists
//! round-trip, since the engine owns `lastCodeIndexCommit` bookkeeping.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STORE_DIR_NAME: &str = ".yep-mem";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub provider: String,
    pub model: String,
    pub last_indexed_commit: Option<String>,
    pub last_code_index_commit: Option<String>,
    pub dimensions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: "text-embedding-3-small".to_string(),
            last_indexed_commit: None,
            last_code_index_commit: None,
            dimensions: 1536,
        }
    }
}

pub fn store_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(STORE_DIR_NAME)
}

fn config_path(repo_root: &Path) -> PathBuf {
    store_dir(repo_root).join("config.json")
}

impl Config {
    /// Load config, or `Default` if `.yep-mem/` hasn't been created yet.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = config_path(repo_root);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Ok(Self::default());
        };
        serde_json::from_str(&text).with_context(|| format!("invalid config at {}", path.display()))
    }

    pub fn save(&self, repo_root: &Path) -> Result<()> {
        let dir = store_dir(repo_root);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path(repo_root), text).context("writing config.json")
    }

    /// `.yep-mem/` exists and carries a readable config — the `NotInitialized`
    /// boundary check.
    pub fn is_initialized(repo_root: &Path) -> bool {
        config_path(repo_root).is_file()
    }
}
