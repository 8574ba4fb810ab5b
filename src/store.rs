//! Vector store. One `lancedb::Connection` shared by the
//! whole `Engine`, holding the four logical tables. Each row is built into
//! a `FixedSizeListArray` for the vector column plus typed
//! `StringArray`/numeric columns for the rest.
//!
//! LanceDB 0.4 predates native full-text search, so `embeddingText` is
//! mirrored into a `tantivy` index under `store/fts/<table>/` and joined
//! back to full rows by id — the FTS leg of hybrid search queries tantivy
//! first, then re-reads matching rows from LanceDB.

use crate::error::CoreError;
use crate::model::{CodeChunk, EdgeType, GraphEdge, Language, MetricsSnapshot, SolutionChunk, SymbolType, Trend};
use anyhow::{anyhow, Context, Result};
use arrow_array::{ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Schema as TantivySchema, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter};

pub const CODE_SYMBOLS_TABLE: &str = "code_symbols";
pub const SOLUTIONS_TABLE: &str = "solutions";
pub const CODE_METRICS_TABLE: &str = "code_metrics";
pub const GRAPH_EDGES_TABLE: &str = "graph_edges";

/// Escapes `'` by doubling for safe where-clause interpolation; callers
/// never interpolate untrusted identifiers without going through this.
pub fn sql_quote(s: &str) -> String {
    s.replace('\'', "''")
}

pub fn quote_ident(ident: &str) -> String {
    if ident.chars().any(|c| c.is_uppercase()) {
        format!("\"{ident}\"")
    } else {
        ident.to_string()
    }
}

struct FtsTable {
    index: Index,
    writer: Mutex<IndexWriter>,
    id_field: tantivy::schema::Field,
    text_field: tantivy::schema::Field,
}

impl FtsTable {
    fn open_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut schema_builder = TantivySchema::builder();
        let id_field = schema_builder.add_text_field("id", STRING | STORED);
        let text_field = schema_builder.add_text_field("text", TEXT);
        let schema = schema_builder.build();

        let dir_handle = tantivy::directory::MmapDirectory::open(dir)?;
        let index = Index::open_or_create(dir_handle, schema)?;
        let writer = index.writer(50_000_000)?;
        Ok(Self { index, writer: Mutex::new(writer), id_field, text_field })
    }

    fn upsert(&self, id: &str, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.delete_term(tantivy::Term::from_field_text(self.id_field, id));
        writer.add_document(doc!(self.id_field => id, self.text_field => text))?;
        Ok(())
    }

    fn delete_ids(&self, ids: &[String]) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        for id in ids {
            writer.delete_term(tantivy::Term::from_field_text(self.id_field, id));
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.writer.lock().unwrap().commit()?;
        Ok(())
    }

    fn search(&self, query_text: &str, limit: usize) -> Result<Vec<String>> {
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let query = parser.parse_query_lenient(query_text).0;
        let top = searcher.search(&query, &TopDocs::with_limit(limit))?;
        let mut out = Vec::with_capacity(top.len());
        for (_score, addr) in top {
            let retrieved = searcher.doc::<tantivy::TantivyDocument>(addr)?;
            if let Some(v) = retrieved.get_first(self.id_field) {
                if let Some(s) = v.as_str() {
                    out.push(s.to_string());
                }
            }
        }
        Ok(out)
    }
}

pub struct VectorStore {
    db: lancedb::Connection,
    fts: HashMap<&'static str, FtsTable>,
    pub dimensions: usize,
}

impl VectorStore {
    pub async fn open(store_dir: &Path, dimensions: usize) -> Result<Self> {
        std::fs::create_dir_all(store_dir).context("creating store dir")?;
        let lance_path = store_dir.join("lance");
        let db = lancedb::connect(lance_path.to_string_lossy().as_ref())
            .execute()
            .await
            .context("opening lancedb connection")?;

        let mut fts = HashMap::new();
        fts.insert(CODE_SYMBOLS_TABLE, FtsTable::open_or_create(&store_dir.join("fts").join(CODE_SYMBOLS_TABLE))?);
        fts.insert(SOLUTIONS_TABLE, FtsTable::open_or_create(&store_dir.join("fts").join(SOLUTIONS_TABLE))?);

        Ok(Self { db, fts, dimensions })
    }

    fn check_dimension(&self, actual: usize) -> Result<(), CoreError> {
        if actual != self.dimensions {
            return Err(CoreError::DimensionMismatch { expected: self.dimensions, actual });
        }
        Ok(())
    }

    // ---- code_symbols -------------------------------------------------

    pub async fn upsert_code_chunks(&self, path: &str, chunks: &[CodeChunk]) -> Result<()> {
        for c in chunks {
            self.check_dimension(c.vector.len())?;
        }
        self.delete_code_symbols_by_path(path).await?;
        if chunks.is_empty() {
            return Ok(());
        }
        let batch = code_chunks_to_batch(chunks)?;
        let table = self.open_or_create_table(CODE_SYMBOLS_TABLE, batch).await?;
        let reader = code_chunks_to_batch_reader(chunks)?;
        table.add(reader).execute().await.context("inserting code_symbols rows")?;

        let fts = self.fts.get(CODE_SYMBOLS_TABLE).unwrap();
        for c in chunks {
            fts.upsert(&c.id, &c.embedding_text)?;
        }
        fts.commit()?;
        Ok(())
    }

    pub async fn delete_code_symbols_by_path(&self, path: &str) -> Result<()> {
        if let Ok(table) = self.db.open_table(CODE_SYMBOLS_TABLE).execute().await {
            let expr = format!("path = '{}'", sql_quote(path));
            let ids = self.select_ids(&table, &expr).await.unwrap_or_default();
            let _ = table.delete(&expr).await;
            if let Some(fts) = self.fts.get(CODE_SYMBOLS_TABLE) {
                let _ = fts.delete_ids(&ids);
                let _ = fts.commit();
            }
        }
        Ok(())
    }

    async fn select_ids(&self, table: &lancedb::Table, expr: &str) -> Result<Vec<String>> {
        let mut stream = table
            .query()
            .only_if(expr)
            .select(Select::columns(&["id"]))
            .execute()
            .await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(string_column(&batch, "id"));
        }
        Ok(out)
    }

    pub async fn count_code_symbols(&self) -> Result<usize> {
        match self.db.open_table(CODE_SYMBOLS_TABLE).execute().await {
            Ok(t) => Ok(t.count_rows(None).await?),
            Err(_) => Ok(0),
        }
    }

    /// Full scan bounded at 10 000 rows, per the graph/insights contract
    ///.
    pub async fn all_code_chunks(&self) -> Result<Vec<CodeChunk>> {
        let Ok(table) = self.db.open_table(CODE_SYMBOLS_TABLE).execute().await else {
            return Ok(Vec::new());
        };
        let mut stream = table.query().limit(10_000).execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_code_chunks(&batch)?);
        }
        Ok(out)
    }

    /// Like `all_code_chunks` but also decodes the `vector` column, for
    /// callers that need real embeddings (duplicate clustering) rather than
    /// the zeroed-out placeholder the plain row readers use.
    pub async fn code_chunks_with_vectors(&self, limit: usize) -> Result<Vec<(CodeChunk, Vec<f32>)>> {
        let Ok(table) = self.db.open_table(CODE_SYMBOLS_TABLE).execute().await else {
            return Ok(Vec::new());
        };
        let mut stream = table.query().limit(limit).execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let chunks = batch_to_code_chunks(&batch)?;
            let vectors = vector_column(&batch, "vector");
            out.extend(chunks.into_iter().zip(vectors));
        }
        Ok(out)
    }

    pub async fn code_chunks_where(&self, expr: &str, limit: usize) -> Result<Vec<CodeChunk>> {
        let Ok(table) = self.db.open_table(CODE_SYMBOLS_TABLE).execute().await else {
            return Ok(Vec::new());
        };
        let mut q = table.query().limit(limit);
        if !expr.is_empty() {
            q = q.only_if(expr);
        }
        let mut stream = q.execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_code_chunks(&batch)?);
        }
        Ok(out)
    }

    pub async fn code_vector_search(&self, vector: &[f32], expr: Option<&str>, limit: usize) -> Result<Vec<CodeChunk>> {
        self.check_dimension(vector.len())?;
        let Ok(table) = self.db.open_table(CODE_SYMBOLS_TABLE).execute().await else {
            return Ok(Vec::new());
        };
        let mut q = table.vector_search(vector.to_vec())?.column("vector").limit(limit);
        if let Some(e) = expr {
            q = q.only_if(e);
        }
        let mut stream = q.execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_code_chunks(&batch)?);
        }
        Ok(out)
    }

    pub async fn code_fts_search(&self, query_text: &str, limit: usize) -> Result<Vec<CodeChunk>> {
        let Some(fts) = self.fts.get(CODE_SYMBOLS_TABLE) else { return Ok(Vec::new()) };
        let ids = fts.search(query_text, limit)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let in_list = ids.iter().map(|i| format!("'{}'", sql_quote(i))).collect::<Vec<_>>().join(", ");
        self.code_chunks_where(&format!("id IN ({in_list})"), limit).await
    }

    pub async fn code_exact_name(&self, name: &str, limit: usize) -> Result<Vec<CodeChunk>> {
        let escaped = sql_quote(name);
        let expr = format!("symbol = '{escaped}' OR symbol LIKE '%.{escaped}' OR symbol LIKE '{escaped}%'");
        self.code_chunks_where(&expr, limit).await
    }

    pub async fn create_fts_index(&self) -> Result<()> {
        // Idempotent: tantivy commits are already durable; nothing further
        // to materialize here.
        Ok(())
    }

    // ---- solutions -----------------------------------------------------

    pub async fn upsert_solutions(&self, chunks: &[SolutionChunk]) -> Result<()> {
        for c in chunks {
            self.check_dimension(c.vector.len())?;
        }
        if chunks.is_empty() {
            return Ok(());
        }
        let batch = solutions_to_batch(chunks)?;
        let table = self.open_or_create_table(SOLUTIONS_TABLE, batch).await?;
        let reader = solutions_to_batch_reader(chunks)?;
        table.add(reader).execute().await.context("inserting solutions rows")?;

        let fts = self.fts.get(SOLUTIONS_TABLE).unwrap();
        for c in chunks {
            fts.upsert(&c.id, &c.embedding_text)?;
        }
        fts.commit()?;
        Ok(())
    }

    pub async fn solutions_vector_search(&self, vector: &[f32], limit: usize) -> Result<Vec<SolutionChunk>> {
        self.check_dimension(vector.len())?;
        let Ok(table) = self.db.open_table(SOLUTIONS_TABLE).execute().await else {
            return Ok(Vec::new());
        };
        let mut stream = table.vector_search(vector.to_vec())?.column("vector").limit(limit).execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_solutions(&batch)?);
        }
        Ok(out)
    }

    pub async fn solutions_fts_search(&self, query_text: &str, limit: usize) -> Result<Vec<SolutionChunk>> {
        let Some(fts) = self.fts.get(SOLUTIONS_TABLE) else { return Ok(Vec::new()) };
        let ids = fts.search(query_text, limit)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let Ok(table) = self.db.open_table(SOLUTIONS_TABLE).execute().await else {
            return Ok(Vec::new());
        };
        let in_list = ids.iter().map(|i| format!("'{}'", sql_quote(i))).collect::<Vec<_>>().join(", ");
        let mut stream = table.query().only_if(format!("id IN ({in_list})")).limit(limit).execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_solutions(&batch)?);
        }
        Ok(out)
    }

    pub async fn count_solutions(&self) -> Result<usize> {
        match self.db.open_table(SOLUTIONS_TABLE).execute().await {
            Ok(t) => Ok(t.count_rows(None).await?),
            Err(_) => Ok(0),
        }
    }

    // ---- code_metrics (snapshots) --------------------------------------

    pub async fn append_snapshot(&self, snap: &MetricsSnapshot) -> Result<()> {
        let batch = snapshot_to_batch(std::slice::from_ref(snap))?;
        let table = self.open_or_create_table(CODE_METRICS_TABLE, batch).await?;
        let reader = snapshot_to_batch_reader(std::slice::from_ref(snap))?;
        table.add(reader).execute().await.context("inserting snapshot row")?;
        Ok(())
    }

    pub async fn snapshot_history(&self, limit: usize) -> Result<Vec<MetricsSnapshot>> {
        let Ok(table) = self.db.open_table(CODE_METRICS_TABLE).execute().await else {
            return Ok(Vec::new());
        };
        let mut stream = table.query().execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_snapshots(&batch)?);
        }
        // Ordering is lexicographic by timestamp; latest = max.
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit);
        Ok(out)
    }

    /// Drop snapshots older than `retain_days`.
    pub async fn prune_snapshots(&self, cutoff_iso: &str) -> Result<()> {
        if let Ok(table) = self.db.open_table(CODE_METRICS_TABLE).execute().await {
            let _ = table.delete(&format!("timestamp < '{}'", sql_quote(cutoff_iso))).await;
        }
        Ok(())
    }

    // ---- graph_edges -----------------------------------------------------

    pub async fn replace_graph_edges(&self, edges: &[GraphEdge]) -> Result<()> {
        if let Ok(table) = self.db.open_table(GRAPH_EDGES_TABLE).execute().await {
            let _ = table.delete("true").await;
            if !edges.is_empty() {
                table.add(graph_edges_to_batch_reader(edges)?).execute().await?;
            }
            return Ok(());
        }
        if !edges.is_empty() {
            let batch = graph_edges_to_batch(edges)?;
            self.open_or_create_table(GRAPH_EDGES_TABLE, batch).await?;
        }
        Ok(())
    }

    pub async fn all_graph_edges(&self) -> Result<Vec<GraphEdge>> {
        let Ok(table) = self.db.open_table(GRAPH_EDGES_TABLE).execute().await else {
            return Ok(Vec::new());
        };
        let mut stream = table.query().execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_graph_edges(&batch)?);
        }
        Ok(out)
    }

    async fn open_or_create_table(&self, name: &str, seed_batch: RecordBatch) -> Result<lancedb::Table> {
        match self.db.open_table(name).execute().await {
            Ok(t) => Ok(t),
            Err(_) => {
                let schema = seed_batch.schema();
                let iter = RecordBatchIterator::new(vec![Ok(seed_batch)].into_iter(), schema.clone());
                let table = self.db.create_table(name, Box::new(iter)).execute().await?;
                // Seed row(s) were only needed to establish the schema; the
                // real insert happens via the caller's own `add`. Clear it
                // back out so the seed doesn't linger as a phantom row.
                let _ = table.delete("true").await;
                Ok(table)
            }
        }
    }
}

// ---- Arrow <-> CodeChunk -------------------------------------------------

fn code_symbols_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("path", DataType::Utf8, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("symbolType", DataType::Utf8, false),
        Field::new("language", DataType::Utf8, false),
        Field::new("body", DataType::Utf8, false),
        Field::new("summary", DataType::Utf8, false),
        Field::new("embeddingText", DataType::Utf8, false),
        Field::new("startLine", DataType::UInt32, false),
        Field::new("endLine", DataType::UInt32, false),
        Field::new("jsDoc", DataType::Utf8, false),
        Field::new("calls", DataType::Utf8, false),
        Field::new("imports", DataType::Utf8, false),
        Field::new("lastModified", DataType::Utf8, false),
        Field::new("commit", DataType::Utf8, false),
        Field::new("gitChangeCount", DataType::UInt32, true),
        Field::new("gitAuthorCount", DataType::UInt32, true),
        Field::new("gitLastChangeDate", DataType::Utf8, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), dim),
            false,
        ),
    ]))
}

fn vector_array(vectors: &[Vec<f32>], dim: usize) -> Result<ArrayRef> {
    let mut flat = Vec::with_capacity(vectors.len() * dim);
    for v in vectors {
        if v.len() != dim {
            return Err(anyhow!("embedding dimension mismatch in batch"));
        }
        flat.extend_from_slice(v);
    }
    let values: ArrayRef = Arc::new(Float32Array::from(flat));
    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    Ok(Arc::new(FixedSizeListArray::try_new(item_field, dim as i32, values, None)?))
}

fn code_chunks_to_batch(chunks: &[CodeChunk]) -> Result<RecordBatch> {
    let dim = chunks.first().map(|c| c.vector.len()).unwrap_or(1).max(1);
    let schema = code_symbols_schema(dim as i32);
    let vectors: Vec<Vec<f32>> = chunks.iter().map(|c| if c.vector.is_empty() { vec![0.0; dim] } else { c.vector.clone() }).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.path.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.symbol.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.symbol_type.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.language.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.body.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.summary.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.embedding_text.as_str()).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(chunks.iter().map(|c| c.start_line).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(chunks.iter().map(|c| c.end_line).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.js_doc.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.calls.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.imports.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.last_modified.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.commit.as_str()).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(chunks.iter().map(|c| c.git_change_count).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(chunks.iter().map(|c| c.git_author_count).collect::<Vec<_>>())),
        Arc::new(chunks.iter().map(|c| c.git_last_change_date.clone()).collect::<StringArray>()),
        vector_array(&vectors, dim)?,
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn code_chunks_to_batch_reader(chunks: &[CodeChunk]) -> Result<Box<dyn arrow_array::RecordBatchReader + Send>> {
    let batch = code_chunks_to_batch(chunks)?;
    let schema = batch.schema();
    Ok(Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema)))
}

fn string_column(batch: &RecordBatch, name: &str) -> Vec<String> {
    let Some(idx) = batch.schema().index_of(name).ok() else { return Vec::new() };
    let Some(arr) = batch.column(idx).as_any().downcast_ref::<StringArray>() else { return Vec::new() };
    (0..arr.len()).filter(|&i| arr.is_valid(i)).map(|i| arr.value(i).to_string()).collect()
}

fn opt_string_column(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
    let Some(idx) = batch.schema().index_of(name).ok() else { return vec![None; batch.num_rows()] };
    let Some(arr) = batch.column(idx).as_any().downcast_ref::<StringArray>() else { return vec![None; batch.num_rows()] };
    (0..arr.len()).map(|i| if arr.is_valid(i) { Some(arr.value(i).to_string()) } else { None }).collect()
}

fn u32_column(batch: &RecordBatch, name: &str) -> Vec<u32> {
    let Some(idx) = batch.schema().index_of(name).ok() else { return vec![0; batch.num_rows()] };
    let Some(arr) = batch.column(idx).as_any().downcast_ref::<UInt32Array>() else { return vec![0; batch.num_rows()] };
    (0..arr.len()).map(|i| if arr.is_valid(i) { arr.value(i) } else { 0 }).collect()
}

fn opt_u32_column(batch: &RecordBatch, name: &str) -> Vec<Option<u32>> {
    let Some(idx) = batch.schema().index_of(name).ok() else { return vec![None; batch.num_rows()] };
    let Some(arr) = batch.column(idx).as_any().downcast_ref::<UInt32Array>() else { return vec![None; batch.num_rows()] };
    (0..arr.len()).map(|i| if arr.is_valid(i) { Some(arr.value(i)) } else { None }).collect()
}

fn f64_column(batch: &RecordBatch, name: &str) -> Vec<f64> {
    use arrow_array::Float64Array;
    let Some(idx) = batch.schema().index_of(name).ok() else { return vec![0.0; batch.num_rows()] };
    let Some(arr) = batch.column(idx).as_any().downcast_ref::<Float64Array>() else { return vec![0.0; batch.num_rows()] };
    (0..arr.len()).map(|i| if arr.is_valid(i) { arr.value(i) } else { 0.0 }).collect()
}

/// Decode the `FixedSizeListArray` vector column back into one `Vec<f32>`
/// per row; a row with no vector (or the column missing entirely) yields an
/// empty vector rather than erroring, matching the "tolerate schema
/// evolution" contract.
fn vector_column(batch: &RecordBatch, name: &str) -> Vec<Vec<f32>> {
    let n = batch.num_rows();
    let Some(idx) = batch.schema().index_of(name).ok() else { return vec![Vec::new(); n] };
    let Some(list) = batch.column(idx).as_any().downcast_ref::<FixedSizeListArray>() else { return vec![Vec::new(); n] };
    let dim = list.value_length() as usize;
    (0..n)
        .map(|i| {
            if !list.is_valid(i) {
                return Vec::new();
            }
            let values = list.value(i);
            let Some(arr) = values.as_any().downcast_ref::<Float32Array>() else { return Vec::new() };
            (0..dim.min(arr.len())).map(|j| arr.value(j)).collect()
        })
        .collect()
}

fn symbol_type_from_str(s: &str) -> SymbolType {
    match s {
        "function" => SymbolType::Function,
        "method" => SymbolType::Method,
        "class" => SymbolType::Class,
        "interface" => SymbolType::Interface,
        "type" => SymbolType::Type,
        "enum" => SymbolType::Enum,
        "component" => SymbolType::Component,
        "constant" => SymbolType::Constant,
        "variable" => SymbolType::Variable,
        "hook" => SymbolType::Hook,
        _ => SymbolType::Variable,
    }
}

fn language_from_str(s: &str) -> Language {
    Language::from_extension(match s {
        "typescript" => "ts",
        "javascript" => "js",
        "python" => "py",
        "go" => "go",
        "rust" => "rs",
        _ => "rs",
    })
    .unwrap_or(Language::Rust)
}

fn trend_from_str(s: &str) -> Trend {
    match s {
        "up" => Trend::Up,
        "down" => Trend::Down,
        _ => Trend::Stable,
    }
}

fn batch_to_code_chunks(batch: &RecordBatch) -> Result<Vec<CodeChunk>> {
    let n = batch.num_rows();
    let ids = string_column(batch, "id");
    let paths = string_column(batch, "path");
    let symbols = string_column(batch, "symbol");
    let types = string_column(batch, "symbolType");
    let langs = string_column(batch, "language");
    let bodies = string_column(batch, "body");
    let summaries = string_column(batch, "summary");
    let embs = string_column(batch, "embeddingText");
    let starts = u32_column(batch, "startLine");
    let ends = u32_column(batch, "endLine");
    let docs = string_column(batch, "jsDoc");
    let calls = string_column(batch, "calls");
    let imports = string_column(batch, "imports");
    let modified = string_column(batch, "lastModified");
    let commits = string_column(batch, "commit");
    let change_counts = opt_u32_column(batch, "gitChangeCount");
    let author_counts = opt_u32_column(batch, "gitAuthorCount");
    let change_dates = opt_string_column(batch, "gitLastChangeDate");

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(CodeChunk {
            id: ids.get(i).cloned().unwrap_or_default(),
            path: paths.get(i).cloned().unwrap_or_default(),
            symbol: symbols.get(i).cloned().unwrap_or_default(),
            symbol_type: symbol_type_from_str(types.get(i).map(|s| s.as_str()).unwrap_or("")),
            language: language_from_str(langs.get(i).map(|s| s.as_str()).unwrap_or("")),
            body: bodies.get(i).cloned().unwrap_or_default(),
            summary: summaries.get(i).cloned().unwrap_or_default(),
            embedding_text: embs.get(i).cloned().unwrap_or_default(),
            start_line: starts.get(i).copied().unwrap_or(0),
            end_line: ends.get(i).copied().unwrap_or(0),
            js_doc: docs.get(i).cloned().unwrap_or_default(),
            calls: calls.get(i).cloned().unwrap_or_default(),
            imports: imports.get(i).cloned().unwrap_or_default(),
            last_modified: modified.get(i).cloned().unwrap_or_default(),
            commit: commits.get(i).cloned().unwrap_or_default(),
            git_change_count: change_counts.get(i).copied().flatten(),
            git_author_count: author_counts.get(i).copied().flatten(),
            git_last_change_date: change_dates.get(i).cloned().flatten(),
            vector: Vec::new(),
        });
    }
    Ok(out)
}

// ---- Arrow <-> SolutionChunk ----------------------------------------------

fn solutions_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("checkpointId", DataType::Utf8, false),
        Field::new("sessionIndex", DataType::UInt32, false),
        Field::new("prompt", DataType::Utf8, false),
        Field::new("response", DataType::Utf8, false),
        Field::new("diffSummary", DataType::Utf8, false),
        Field::new("embeddingText", DataType::Utf8, false),
        Field::new("summary", DataType::Utf8, false),
        Field::new("agent", DataType::Utf8, false),
        Field::new("timestamp", DataType::Utf8, false),
        Field::new("filesChanged", DataType::Utf8, false),
        Field::new("tokensUsed", DataType::UInt32, false),
        Field::new("symbols", DataType::Utf8, false),
        Field::new("language", DataType::Utf8, true),
        Field::new("confidence", DataType::Float32, false),
        Field::new("source", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), dim),
            false,
        ),
    ]))
}

fn solutions_to_batch(chunks: &[SolutionChunk]) -> Result<RecordBatch> {
    let dim = chunks.first().map(|c| c.vector.len()).unwrap_or(1).max(1);
    let schema = solutions_schema(dim as i32);
    let vectors: Vec<Vec<f32>> = chunks.iter().map(|c| if c.vector.is_empty() { vec![0.0; dim] } else { c.vector.clone() }).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.checkpoint_id.as_str()).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(chunks.iter().map(|c| c.session_index).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.prompt.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.response.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.diff_summary.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.embedding_text.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.summary.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.agent.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.timestamp.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.files_changed.join(",")).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(chunks.iter().map(|c| c.tokens_used as u32).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.symbols.join(",")).collect::<Vec<_>>())),
        Arc::new(chunks.iter().map(|c| c.language.map(|l| l.as_str().to_string())).collect::<StringArray>()),
        Arc::new(Float32Array::from(chunks.iter().map(|c| c.confidence).collect::<Vec<_>>())),
        Arc::new(StringArray::from(chunks.iter().map(|c| c.source.as_str()).collect::<Vec<_>>())),
        vector_array(&vectors, dim)?,
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn solutions_to_batch_reader(chunks: &[SolutionChunk]) -> Result<Box<dyn arrow_array::RecordBatchReader + Send>> {
    let batch = solutions_to_batch(chunks)?;
    let schema = batch.schema();
    Ok(Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema)))
}

fn batch_to_solutions(batch: &RecordBatch) -> Result<Vec<SolutionChunk>> {
    let n = batch.num_rows();
    let ids = string_column(batch, "id");
    let checkpoint_ids = string_column(batch, "checkpointId");
    let session_indices = u32_column(batch, "sessionIndex");
    let prompts = string_column(batch, "prompt");
    let responses = string_column(batch, "response");
    let diffs = string_column(batch, "diffSummary");
    let embs = string_column(batch, "embeddingText");
    let summaries = string_column(batch, "summary");
    let agents = string_column(batch, "agent");
    let timestamps = string_column(batch, "timestamp");
    let files = string_column(batch, "filesChanged");
    let tokens = u32_column(batch, "tokensUsed");
    let symbols = string_column(batch, "symbols");
    let languages = opt_string_column(batch, "language");
    let sources = string_column(batch, "source");

    use arrow_array::Float32Array;
    let confidences: Vec<f32> = {
        let idx = batch.schema().index_of("confidence").ok();
        match idx.and_then(|i| batch.column(i).as_any().downcast_ref::<Float32Array>().cloned()) {
            Some(arr) => (0..arr.len()).map(|i| arr.value(i)).collect(),
            None => vec![0.0; n],
        }
    };

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(SolutionChunk {
            id: ids.get(i).cloned().unwrap_or_default(),
            checkpoint_id: checkpoint_ids.get(i).cloned().unwrap_or_default(),
            session_index: session_indices.get(i).copied().unwrap_or(0),
            pair_index: 0,
            prompt: prompts.get(i).cloned().unwrap_or_default(),
            response: responses.get(i).cloned().unwrap_or_default(),
            diff_summary: diffs.get(i).cloned().unwrap_or_default(),
            embedding_text: embs.get(i).cloned().unwrap_or_default(),
            summary: summaries.get(i).cloned().unwrap_or_default(),
            agent: agents.get(i).cloned().unwrap_or_default(),
            timestamp: timestamps.get(i).cloned().unwrap_or_default(),
            files_changed: files.get(i).map(|s| crate::model::split_csv(s).into_iter().map(String::from).collect()).unwrap_or_default(),
            tokens_used: tokens.get(i).copied().unwrap_or(0) as u64,
            symbols: symbols.get(i).map(|s| crate::model::split_csv(s).into_iter().map(String::from).collect()).unwrap_or_default(),
            language: languages.get(i).cloned().flatten().map(|s| language_from_str(&s)),
            confidence: confidences.get(i).copied().unwrap_or(0.0),
            source: sources.get(i).cloned().unwrap_or_default(),
            vector: Vec::new(),
        });
    }
    Ok(out)
}

// ---- Arrow <-> MetricsSnapshot ---------------------------------------------

fn metrics_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("timestamp", DataType::Utf8, false),
        Field::new("commit", DataType::Utf8, false),
        Field::new("totalSymbols", DataType::UInt32, false),
        Field::new("totalFiles", DataType::UInt32, false),
        Field::new("avgComplexity", DataType::Float64, false),
        Field::new("avgSymbolsPerFile", DataType::Float64, false),
        Field::new("documentationCoverage", DataType::Float64, false),
        Field::new("deadCodeCount", DataType::UInt32, false),
        Field::new("duplicateSymbolCount", DataType::UInt32, false),
        Field::new("topComplexSymbols", DataType::Utf8, false),
        Field::new("godSymbols", DataType::Utf8, false),
        Field::new("healthScore", DataType::Float64, false),
        Field::new("complexityTrend", DataType::Utf8, false),
        Field::new("deadCodeTrend", DataType::Utf8, false),
        Field::new("docCoverageTrend", DataType::Utf8, false),
    ]))
}

fn snapshot_to_batch(snaps: &[MetricsSnapshot]) -> Result<RecordBatch> {
    let schema = metrics_schema();
    let trend_str = |t: Trend| match t {
        Trend::Up => "up",
        Trend::Down => "down",
        Trend::Stable => "stable",
    };
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(snaps.iter().map(|s| s.id.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(snaps.iter().map(|s| s.timestamp.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(snaps.iter().map(|s| s.commit.as_str()).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(snaps.iter().map(|s| s.total_symbols).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(snaps.iter().map(|s| s.total_files).collect::<Vec<_>>())),
        Arc::new(arrow_array::Float64Array::from(snaps.iter().map(|s| s.avg_complexity).collect::<Vec<_>>())),
        Arc::new(arrow_array::Float64Array::from(snaps.iter().map(|s| s.avg_symbols_per_file).collect::<Vec<_>>())),
        Arc::new(arrow_array::Float64Array::from(snaps.iter().map(|s| s.documentation_coverage).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(snaps.iter().map(|s| s.dead_code_count).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(snaps.iter().map(|s| s.duplicate_symbol_count).collect::<Vec<_>>())),
        Arc::new(StringArray::from(snaps.iter().map(|s| s.top_complex_symbols.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(snaps.iter().map(|s| s.god_symbols.as_str()).collect::<Vec<_>>())),
        Arc::new(arrow_array::Float64Array::from(snaps.iter().map(|s| s.health_score).collect::<Vec<_>>())),
        Arc::new(StringArray::from(snaps.iter().map(|s| trend_str(s.complexity_trend)).collect::<Vec<_>>())),
        Arc::new(StringArray::from(snaps.iter().map(|s| trend_str(s.dead_code_trend)).collect::<Vec<_>>())),
        Arc::new(StringArray::from(snaps.iter().map(|s| trend_str(s.doc_coverage_trend)).collect::<Vec<_>>())),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn snapshot_to_batch_reader(snaps: &[MetricsSnapshot]) -> Result<Box<dyn arrow_array::RecordBatchReader + Send>> {
    let batch = snapshot_to_batch(snaps)?;
    let schema = batch.schema();
    Ok(Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema)))
}

fn batch_to_snapshots(batch: &RecordBatch) -> Result<Vec<MetricsSnapshot>> {
    let n = batch.num_rows();
    let ids = string_column(batch, "id");
    let timestamps = string_column(batch, "timestamp");
    let commits = string_column(batch, "commit");
    let total_symbols = u32_column(batch, "totalSymbols");
    let total_files = u32_column(batch, "totalFiles");
    let avg_complexity = f64_column(batch, "avgComplexity");
    let avg_spf = f64_column(batch, "avgSymbolsPerFile");
    let doc_cov = f64_column(batch, "documentationCoverage");
    let dead_code = u32_column(batch, "deadCodeCount");
    let dup = u32_column(batch, "duplicateSymbolCount");
    let top_complex = string_column(batch, "topComplexSymbols");
    let god = string_column(batch, "godSymbols");
    let health = f64_column(batch, "healthScore");
    let ct = string_column(batch, "complexityTrend");
    let dt = string_column(batch, "deadCodeTrend");
    let doct = string_column(batch, "docCoverageTrend");

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(MetricsSnapshot {
            id: ids.get(i).cloned().unwrap_or_default(),
            timestamp: timestamps.get(i).cloned().unwrap_or_default(),
            commit: commits.get(i).cloned().unwrap_or_default(),
            total_symbols: total_symbols.get(i).copied().unwrap_or(0),
            total_files: total_files.get(i).copied().unwrap_or(0),
            avg_complexity: avg_complexity.get(i).copied().unwrap_or(0.0),
            avg_symbols_per_file: avg_spf.get(i).copied().unwrap_or(0.0),
            documentation_coverage: doc_cov.get(i).copied().unwrap_or(0.0),
            dead_code_count: dead_code.get(i).copied().unwrap_or(0),
            duplicate_symbol_count: dup.get(i).copied().unwrap_or(0),
            top_complex_symbols: top_complex.get(i).cloned().unwrap_or_default(),
            god_symbols: god.get(i).cloned().unwrap_or_default(),
            health_score: health.get(i).copied().unwrap_or(0.0),
            complexity_trend: trend_from_str(ct.get(i).map(|s| s.as_str()).unwrap_or("stable")),
            dead_code_trend: trend_from_str(dt.get(i).map(|s| s.as_str()).unwrap_or("stable")),
            doc_coverage_trend: trend_from_str(doct.get(i).map(|s| s.as_str()).unwrap_or("stable")),
        });
    }
    Ok(out)
}

// ---- Arrow <-> GraphEdge ---------------------------------------------------

fn graph_edges_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("target", DataType::Utf8, false),
        Field::new("edgeType", DataType::Utf8, false),
        Field::new("sourceFile", DataType::Utf8, false),
        Field::new("count", DataType::UInt32, false),
        Field::new("commit", DataType::Utf8, false),
        Field::new("lastModified", DataType::Utf8, false),
    ]))
}

fn graph_edges_to_batch(edges: &[GraphEdge]) -> Result<RecordBatch> {
    let schema = graph_edges_schema();
    let edge_type_str = |t: EdgeType| match t {
        EdgeType::Calls => "calls",
        EdgeType::Imports => "imports",
    };
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(edges.iter().map(|e| e.id.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(edges.iter().map(|e| e.source.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(edges.iter().map(|e| e.target.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(edges.iter().map(|e| edge_type_str(e.edge_type)).collect::<Vec<_>>())),
        Arc::new(StringArray::from(edges.iter().map(|e| e.source_file.as_str()).collect::<Vec<_>>())),
        Arc::new(UInt32Array::from(edges.iter().map(|e| e.count).collect::<Vec<_>>())),
        Arc::new(StringArray::from(edges.iter().map(|e| e.commit.as_str()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(edges.iter().map(|e| e.last_modified.as_str()).collect::<Vec<_>>())),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn graph_edges_to_batch_reader(edges: &[GraphEdge]) -> Result<Box<dyn arrow_array::RecordBatchReader + Send>> {
    let batch = graph_edges_to_batch(edges)?;
    let schema = batch.schema();
    Ok(Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema)))
}

fn batch_to_graph_edges(batch: &RecordBatch) -> Result<Vec<GraphEdge>> {
    let n = batch.num_rows();
    let ids = string_column(batch, "id");
    let sources = string_column(batch, "source");
    let targets = string_column(batch, "target");
    let types = string_column(batch, "edgeType");
    let source_files = string_column(batch, "sourceFile");
    let counts = u32_column(batch, "count");
    let commits = string_column(batch, "commit");
    let modified = string_column(batch, "lastModified");

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(GraphEdge {
            id: ids.get(i).cloned().unwrap_or_default(),
            source: sources.get(i).cloned().unwrap_or_default(),
            target: targets.get(i).cloned().unwrap_or_default(),
            edge_type: if types.get(i).map(|s| s.as_str()) == Some("imports") { EdgeType::Imports } else { EdgeType::Calls },
            source_file: source_files.get(i).cloned().unwrap_or_default(),
            count: counts.get(i).copied().unwrap_or(0),
            commit: commits.get(i).cloned().unwrap_or_default(),
            last_modified: modified.get(i).cloned().unwrap_or_default(),
        });
    }
    Ok(out)
}

#[allow(dead_code)]
pub fn store_dir_layout(repo_root: &Path) -> PathBuf {
    crate::config::store_dir(repo_root).join("store")
}
