//! Wire-shape entities. Each is a plain `Serialize`/`Deserialize`
//! struct; enums carry `#[serde(rename_all = "...")]` so the on-disk/JSON
//! vocabulary stays lowercase and stable (`function`, `calls`, `up`, ...).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Typescript,
    Javascript,
    Python,
    Go,
    Rust,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ts" | "tsx" => Some(Language::Typescript),
            "js" | "jsx" => Some(Language::Javascript),
            "py" => Some(Language::Python),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Typescript => "typescript",
            Language::Javascript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolType {
    Function,
    Method,
    Class,
    Interface,
    Type,
    Enum,
    Component,
    Constant,
    Variable,
    Hook,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Function => "function",
            SymbolType::Method => "method",
            SymbolType::Class => "class",
            SymbolType::Interface => "interface",
            SymbolType::Type => "type",
            SymbolType::Enum => "enum",
            SymbolType::Component => "component",
            SymbolType::Constant => "constant",
            SymbolType::Variable => "variable",
            SymbolType::Hook => "hook",
        }
    }

    /// Dead-code detection excludes types and interfaces.
    pub fn counts_toward_dead_code(&self) -> bool {
        !matches!(self, SymbolType::Type | SymbolType::Interface)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Calls,
    Imports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// Parameter/return-type/visibility/etc metadata. Kept as a typed struct
/// rather than an untyped field bag; unused fields simply stay at their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SymbolMetadata {
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub generics: Vec<String>,
    pub decorators: Vec<String>,
    pub visibility: Option<String>,
    pub is_async: bool,
    /// `impl Trait for Type` (Rust), `extends`/`implements` (TS), etc.
    pub trait_impl: Option<String>,
    pub go_receiver_pointer: bool,
    /// React hook dependency array, recorded verbatim for `hook` symbols.
    pub hook_deps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub variadic: bool,
}

/// Result of a language driver parsing one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub name: String,
    pub symbol_type: SymbolType,
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub body: String,
    pub js_doc: String,
    pub calls: Vec<String>,
    pub imports: Vec<String>,
    pub metadata: SymbolMetadata,
}

pub const MAX_CALLS: usize = 30;
pub const MAX_IMPORTS: usize = 30;
pub const MAX_BODY_CHARS: usize = 3000;

/// Storage-ready row for `code_symbols`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChunk {
    pub id: String,
    pub path: String,
    pub symbol: String,
    pub symbol_type: SymbolType,
    pub language: Language,
    pub body: String,
    pub summary: String,
    pub embedding_text: String,
    pub start_line: u32,
    pub end_line: u32,
    pub js_doc: String,
    /// Comma-joined base names, kept to a narrow normal form.
    pub calls: String,
    /// Comma-joined `name:module` / bare module tokens.
    pub imports: String,
    pub last_modified: String,
    pub commit: String,
    pub git_change_count: Option<u32>,
    pub git_author_count: Option<u32>,
    pub git_last_change_date: Option<String>,
    #[serde(skip)]
    pub vector: Vec<f32>,
}

impl CodeChunk {
    pub fn calls_list(&self) -> Vec<&str> {
        split_csv(&self.calls)
    }

    pub fn imports_list(&self) -> Vec<&str> {
        split_csv(&self.imports)
    }
}

/// Typed helper replacing ad-hoc substring matching on the `calls`/`imports`
/// columns. Graph analysis always goes through this instead of
/// `LIKE '%name%'` so a short name like `do` cannot match as a substring of
/// an unrelated token.
pub fn split_csv(s: &str) -> Vec<&str> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(|t| t.trim()).filter(|t| !t.is_empty()).collect()
    }
}

/// `name:module` pairs (named imports) or bare module paths.
pub fn import_head(token: &str) -> &str {
    token.split(':').next().unwrap_or(token)
}

pub const MAX_PROMPT_CHARS: usize = 8000;
pub const MAX_RESPONSE_CHARS: usize = 4000;
pub const MAX_DIFF_CHARS: usize = 3000;

/// One prompt/response turn pair extracted from a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionChunk {
    pub id: String,
    pub checkpoint_id: String,
    pub session_index: u32,
    pub pair_index: u32,
    pub prompt: String,
    pub response: String,
    pub diff_summary: String,
    pub embedding_text: String,
    pub summary: String,
    pub agent: String,
    pub timestamp: String,
    pub files_changed: Vec<String>,
    pub tokens_used: u64,
    pub symbols: Vec<String>,
    pub language: Option<Language>,
    pub confidence: f32,
    pub source: String,
    #[serde(skip)]
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
    pub source_file: String,
    pub count: u32,
    pub commit: String,
    pub last_modified: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub id: String,
    pub timestamp: String,
    pub commit: String,
    pub total_symbols: u32,
    pub total_files: u32,
    pub avg_complexity: f64,
    pub avg_symbols_per_file: f64,
    pub documentation_coverage: f64,
    pub dead_code_count: u32,
    pub duplicate_symbol_count: u32,
    pub top_complex_symbols: String,
    pub god_symbols: String,
    pub health_score: f64,
    pub complexity_trend: Trend,
    pub dead_code_trend: Trend,
    pub doc_coverage_trend: Trend,
}

/// A candidate returned by retrieval/ranking, paired with its fused score.
#[derive(Debug, Clone, Serialize)]
pub struct Scored<T> {
    pub chunk: T,
    pub score: f64,
}
