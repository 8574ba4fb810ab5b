//! Working-copy walk. Uses `ignore`'s gitignore-aware walker, narrowed to a
//! fixed `IGNORE_DIRS`/`CODE_EXTENSIONS` set rather than a configurable
//! builder — there's no notion of "optimize for token budget" here, only
//! "is this a source file we index".

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

pub const IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    "dist",
    "build",
    ".yep-mem",
    ".entire",
    "coverage",
    ".turbo",
    ".cache",
];

pub const CODE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "py", "go", "rs"];

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    pub rel_path: String,
}

fn is_code_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CODE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_ignored_component(name: &str) -> bool {
    name.starts_with('.') || IGNORE_DIRS.contains(&name)
}

/// Walk `repo_root`, skipping `IGNORE_DIRS` and dot-prefixed directories,
/// keeping files whose extension is in `CODE_EXTENSIONS`. Also respects
/// `.gitignore` as a reasonable superset of the hardcoded ignore list.
pub fn walk(repo_root: &Path) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    let walker = WalkBuilder::new(repo_root)
        .standard_filters(true)
        .filter_entry(|e| {
            let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                return true;
            }
            match e.file_name().to_str() {
                Some(name) => !is_ignored_component(name),
                None => true,
            }
        })
        .build();

    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let abs_path = dent.into_path();
        if !is_code_extension(&abs_path) {
            continue;
        }

        let rel_path = abs_path
            .strip_prefix(repo_root)
            .with_context(|| format!("{} not under {}", abs_path.display(), repo_root.display()))?
            .to_string_lossy()
            .replace('\\', "/");

        entries.push(FileEntry { abs_path, rel_path });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}
