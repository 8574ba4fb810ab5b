//! `yep-mem` CLI. Thin clap front end over
//! `Engine`; every subcommand maps `CoreError` to the exit-code contract
//! (0 success, 1 initialization/other errors, 2 lock contention).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use yep_mem::config::Config;
use yep_mem::embedder::{Embedder, LocalHashEmbedder};
use yep_mem::error::CoreError;
use yep_mem::retrieval::CodeFilter;
use yep_mem::Engine;

#[derive(Parser)]
#[command(name = "yep-mem", version, about = "Local code and conversation memory engine")]
struct Cli {
    /// Repository root; defaults to the current directory.
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk the repo (or diff against the last indexed commit) and upsert symbols.
    Index {
        /// Skip per-symbol `git log --follow` enrichment for a faster run.
        #[arg(long)]
        no_git: bool,
    },
    /// Hybrid search over code symbols.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        #[arg(long)]
        no_rank: bool,
    },
    /// Hybrid search over past solution transcripts.
    SearchSolutions {
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Structural insights: hot files, dead code, duplicate clusters.
    Insights,
    /// Rule-based improvement recommendations.
    Recommend,
    /// Capture a metrics snapshot and print the trend deltas.
    Snapshot,
    /// File co-change pairs mined from git history.
    CoChange {
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
    /// Validate `.yep-mem/` layout and print basic counts.
    Doctor,
}

fn repo_root(cli: &Cli) -> PathBuf {
    cli.repo.clone().unwrap_or_else(|| PathBuf::from("."))
}

async fn open_engine(repo: &std::path::Path) -> Result<Engine, CoreError> {
    let config = Config::load(repo).map_err(|e| CoreError::StoreError(e.to_string()))?;
    let embedder: Box<dyn Embedder> = Box::new(LocalHashEmbedder::new(config.dimensions));
    Engine::open(repo, embedder).await
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let repo = repo_root(&cli);

    match cli.command {
        Command::Index { no_git } => {
            let engine = open_engine(&repo).await?;
            let report = engine.run_code_index(!no_git, None).await?;
            println!(
                "indexed {} file(s), {} chunk(s) upserted, {} failure(s), commit {}",
                report.files_indexed,
                report.chunks_upserted,
                report.failed_files.len(),
                report.commit
            );
            if !report.failed_files.is_empty() {
                eprintln!("failed: {}", report.failed_files.join(", "));
            }
        }
        Command::Search { query, top_k, no_rank } => {
            Engine::require_initialized(&repo)?;
            let engine = open_engine(&repo).await?;
            let results = engine
                .search_code(&query, top_k, &CodeFilter::default(), !no_rank)
                .await
                .map_err(|e| CoreError::StoreError(e.to_string()))?;
            for r in results {
                println!("{:.4}  {}  {}:{}", r.score, r.chunk.symbol, r.chunk.path, r.chunk.start_line);
            }
        }
        Command::SearchSolutions { query, top_k } => {
            Engine::require_initialized(&repo)?;
            let engine = open_engine(&repo).await?;
            let results = engine.search_solutions(&query, top_k).await.map_err(|e| CoreError::StoreError(e.to_string()))?;
            for r in results {
                println!("{:.4}  {}  {}", r.score, r.chunk.checkpoint_id, r.chunk.summary);
            }
        }
        Command::Insights => {
            Engine::require_initialized(&repo)?;
            let engine = open_engine(&repo).await?;
            let insights = engine.get_code_insights().await.map_err(|e| CoreError::StoreError(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&insights).unwrap_or_default());
        }
        Command::Recommend => {
            Engine::require_initialized(&repo)?;
            let engine = open_engine(&repo).await?;
            let recs = engine.get_recommendations().await.map_err(|e| CoreError::StoreError(e.to_string()))?;
            for r in recs {
                println!("[{:?}] {} - {}", r.priority, r.title, r.detail);
            }
        }
        Command::Snapshot => {
            Engine::require_initialized(&repo)?;
            let engine = open_engine(&repo).await?;
            let latest = engine.get_latest_snapshot().await.map_err(|e| CoreError::StoreError(e.to_string()))?;
            match latest {
                Some(s) => println!("{}", serde_json::to_string_pretty(&s).unwrap_or_default()),
                None => println!("no snapshot yet; run `yep-mem index` first"),
            }
        }
        Command::CoChange { days } => {
            Engine::require_initialized(&repo)?;
            let engine = open_engine(&repo).await?;
            let pairs = engine.analyze_co_change(days)?;
            for p in pairs {
                println!("{:.2}  {} <-> {}  ({} shared commits)", p.confidence, p.file_a, p.file_b, p.change_count);
            }
        }
        Command::Doctor => {
            if !Config::is_initialized(&repo) {
                println!("not initialized: run `yep-mem index` to create .yep-mem/");
            } else {
                let engine = open_engine(&repo).await?;
                let (symbols, solutions) = engine.get_stats().await.map_err(|e| CoreError::StoreError(e.to_string()))?;
                println!("ok: {symbols} code symbol(s), {solutions} solution chunk(s)");
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
