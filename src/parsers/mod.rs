//! Language parser set. `parse(path) -> Vec<Symbol>` is
//! total: on failure it logs at `warn` and returns whatever was gathered
//! (here: nothing, since tree-sitter either parses or doesn't — there is no
//! partial-AST path for these grammars). Unknown extensions are skipped by
//! the caller before this module is ever reached.

pub mod common;
pub mod go;
pub mod python;
pub mod rust;
pub mod typescript;

use crate::model::{Language, Symbol};
use std::path::Path;

pub fn language_for_path(path: &Path) -> Option<Language> {
    let ext = path.extension()?.to_str()?;
    Language::from_extension(ext)
}

/// Parse one file. Never panics; a grammar or query failure is logged and
/// yields an empty symbol list for that file rather than propagating.
pub fn parse(path: &str, source_text: &str) -> Vec<Symbol> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match Language::from_extension(&ext) {
        Some(Language::Rust) => rust::parse(path, source_text),
        Some(Language::Python) => python::parse(path, source_text),
        Some(Language::Go) => go::parse(path, source_text),
        Some(Language::Typescript) | Some(Language::Javascript) => typescript::parse(path, source_text, &ext),
        None => {
            tracing::warn!(path, "unsupported extension, skipping parse");
            Vec::new()
        }
    }
}
