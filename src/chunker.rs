//! Chunker: `Symbol` → `CodeChunk` with deterministic identity, and a
//! parsed transcript → `SolutionChunk`s. Chunk identity is an xxh3 hash of
//! `(path, symbol, symbolType, startLine)`, not file content, so moving a
//! symbol within a file changes its id.

use crate::model::{
    import_head, split_csv, CodeChunk, Language, Parameter, Symbol, SolutionChunk,
    MAX_CALLS, MAX_DIFF_CHARS, MAX_IMPORTS, MAX_PROMPT_CHARS, MAX_RESPONSE_CHARS,
};
use crate::transcript::{ParsedCheckpoint, Role, TranscriptEntry};
use xxhash_rust::xxh3::xxh3_64;

const MAX_EMBEDDING_TEXT_CHARS: usize = 5000;

pub fn chunk_id(path: &str, symbol: &str, symbol_type: &str, start_line: u32) -> String {
    let key = format!("{path}|{symbol}|{symbol_type}|{start_line}");
    format!("{:016x}", xxh3_64(key.as_bytes()))
}

fn first_sentence(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let line = trimmed.lines().find(|l| !l.trim().is_empty())?.trim();
    Some(line.to_string())
}

fn signature_from_body(body: &str) -> String {
    match body.find('{') {
        Some(i) => body[..i].trim().to_string(),
        None => body.lines().next().unwrap_or("").trim().to_string(),
    }
}

fn params_to_tokens(params: &[Parameter]) -> String {
    params
        .iter()
        .map(|p| match &p.type_ {
            Some(t) => format!("{}: {}", p.name, t),
            None => p.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn chunk_symbol(symbol: Symbol, language: Language, last_modified: String, commit: String) -> CodeChunk {
    let id = chunk_id(&symbol.path, &symbol.name, symbol.symbol_type.as_str(), symbol.start_line);

    let summary = first_sentence(&symbol.js_doc).unwrap_or_else(|| signature_from_body(&symbol.body));

    let signature_tokens = params_to_tokens(&symbol.metadata.parameters);
    let body_head: String = symbol.body.chars().take(1500).collect();

    let embedding_text = {
        let text = format!(
            "{} {} [{}] {}\n{}\n{}",
            symbol.symbol_type.as_str(),
            symbol.name,
            language.as_str(),
            summary,
            signature_tokens,
            body_head,
        );
        text.chars().take(MAX_EMBEDDING_TEXT_CHARS).collect::<String>()
    };

    let calls = symbol.calls.iter().take(MAX_CALLS).cloned().collect::<Vec<_>>().join(",");
    let imports = symbol.imports.iter().take(MAX_IMPORTS).cloned().collect::<Vec<_>>().join(",");

    CodeChunk {
        id,
        path: symbol.path,
        symbol: symbol.name,
        symbol_type: symbol.symbol_type,
        language,
        body: symbol.body,
        summary,
        embedding_text,
        start_line: symbol.start_line,
        end_line: symbol.end_line,
        js_doc: symbol.js_doc,
        calls,
        imports,
        last_modified,
        commit,
        git_change_count: None,
        git_author_count: None,
        git_last_change_date: None,
        vector: Vec::new(),
    }
}

#[allow(dead_code)]
pub fn resolve_import_head(token: &str) -> &str {
    import_head(token)
}

#[allow(dead_code)]
pub fn calls_of(chunk: &CodeChunk) -> Vec<&str> {
    split_csv(&chunk.calls)
}

// --- SolutionChunk construction -----------------

const FALSE_POSITIVE_FILES: &[&str] = &["node.js", "next.js", "vue.js", "nuxt.js", "express.js", "d3.js"];

fn strip_system_annotations(prompt: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    let mut chars = prompt.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '<' {
            in_tag = true;
            continue;
        }
        if c == '>' && in_tag {
            in_tag = false;
            continue;
        }
        if !in_tag {
            out.push(c);
        }
    }

    // Drop consecutive file-tree lines (heuristic: lines built from
    // box-drawing/indentation characters typical of a rendered tree).
    out.lines()
        .filter(|l| {
            let t = l.trim_start();
            !(t.starts_with("├──") || t.starts_with("└──") || t.starts_with('│'))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn entries_text(entries: &[TranscriptEntry]) -> String {
    entries.iter().map(|e| e.content.as_str()).collect::<Vec<_>>().join("\n")
}

fn file_path_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r#"[\w./-]+\.(ts|tsx|js|jsx|py|go|rs|json|toml|yaml|yml|md)"#).unwrap()
    })
}

fn extract_files_changed(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for m in file_path_regex().find_iter(text) {
        let candidate = m.as_str().to_string();
        let lower = candidate.to_ascii_lowercase();
        if FALSE_POSITIVE_FILES.iter().any(|fp| lower == *fp) {
            continue;
        }
        if seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }
    out
}

const DIFF_MARKERS: &[&str] = &["```diff", "+++ ", "--- ", "@@ "];
const CHANGE_INDICATORS: &[&str] = &["created file", "modified file", "applied patch", "wrote to"];

fn extract_diff_summary(entries: &[TranscriptEntry]) -> String {
    let mut parts: Vec<String> = Vec::new();

    for entry in entries {
        if entry.role != Role::Tool && entry.role != Role::Assistant {
            continue;
        }
        let lower = entry.content.to_ascii_lowercase();
        if DIFF_MARKERS.iter().any(|m| entry.content.contains(m)) || CHANGE_INDICATORS.iter().any(|m| lower.contains(m)) {
            parts.push(entry.content.clone());
        }
    }

    // Mine `+`-prefixed declarations from assistant prose as a fallback.
    for entry in entries.iter().filter(|e| e.role == Role::Assistant) {
        for line in entry.content.lines() {
            if line.trim_start().starts_with('+') && !line.trim_start().starts_with("++") {
                parts.push(line.trim().to_string());
            }
        }
    }

    let joined = parts.join("\n");
    joined.chars().take(MAX_DIFF_CHARS).collect()
}

fn symbol_name_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r#"\b(?:fn|function|def|class|struct|interface|const|type)\s+([A-Za-z_][A-Za-z0-9_]*)"#).unwrap())
}

fn extract_symbols(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for cap in symbol_name_regex().captures_iter(text) {
        let name = cap[1].to_string();
        if seen.insert(name.clone()) {
            out.push(name);
        }
        if out.len() >= 30 {
            break;
        }
    }
    out
}

fn detect_language(files_changed: &[String]) -> Option<Language> {
    let mut counts: std::collections::HashMap<Language, usize> = std::collections::HashMap::new();
    for f in files_changed {
        if let Some(ext) = std::path::Path::new(f).extension().and_then(|e| e.to_str()) {
            if let Some(lang) = Language::from_extension(ext) {
                *counts.entry(lang).or_insert(0) += 1;
            }
        }
    }
    counts.into_iter().max_by_key(|(_, n)| *n).map(|(l, _)| l)
}

/// Build `SolutionChunk`s for every paired (user, assistant) turn across all
/// sessions of a checkpoint.
pub fn chunk_checkpoint(checkpoint: &ParsedCheckpoint) -> Vec<SolutionChunk> {
    let mut out = Vec::new();

    for session in &checkpoint.sessions {
        let mut pair_index = 0u32;
        let mut pending_user: Option<String> = None;

        for (idx, entry) in session.transcript.iter().enumerate() {
            match entry.role {
                Role::User => {
                    pending_user = Some(strip_system_annotations(&entry.content));
                }
                Role::Assistant => {
                    let Some(prompt) = pending_user.take() else { continue };
                    let response: String = entry.content.chars().take(MAX_RESPONSE_CHARS).collect();

                    if prompt.trim().is_empty() && response.trim().is_empty() {
                        continue;
                    }

                    let window_start = idx.saturating_sub(4);
                    let window = &session.transcript[window_start..=idx];

                    let combined = format!("{prompt}\n{response}\n{}", entries_text(window));
                    let files_changed = extract_files_changed(&combined);
                    let diff_summary = extract_diff_summary(window);
                    let symbols = extract_symbols(&format!("{prompt}\n{response}\n{diff_summary}"));
                    let language = detect_language(&files_changed);

                    let prompt_capped: String = prompt.chars().take(MAX_PROMPT_CHARS).collect();
                    let embedding_text = {
                        let text = format!(
                            "Symbols: {}\nQuestion: {}\nAnswer: {}\nChanges: {}",
                            symbols.join(", "),
                            prompt_capped,
                            response,
                            diff_summary,
                        );
                        text.chars().take(MAX_EMBEDDING_TEXT_CHARS).collect::<String>()
                    };

                    let summary = first_sentence(&prompt_capped).unwrap_or_default();

                    out.push(SolutionChunk {
                        id: format!("{}:{}:{}", checkpoint.id, session.session_index, pair_index),
                        checkpoint_id: checkpoint.id.clone(),
                        session_index: session.session_index,
                        pair_index,
                        prompt: prompt_capped,
                        response,
                        diff_summary,
                        embedding_text,
                        summary,
                        agent: session.metadata.agent.clone(),
                        timestamp: checkpoint.metadata.timestamp.clone(),
                        files_changed,
                        tokens_used: session.metadata.token_usage.total_tokens,
                        symbols,
                        language,
                        confidence: 1.0,
                        source: "checkpoint".to_string(),
                        vector: Vec::new(),
                    });

                    pair_index += 1;
                }
                Role::Tool => {}
            }
        }
    }

    out
}
