//! # Poliseek CLI
//!
//! The `poliseek` binary is the operational interface to the retrieval
//! engine: database initialization, document registration, ingestion,
//! embedding status, hybrid search, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! poliseek --config ./config/poliseek.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `poliseek init` | Create the SQLite database and run schema migrations |
//! | `poliseek add <path>` | Register a plain-text document |
//! | `poliseek ingest <id>` | Chunk (once) and embed a document |
//! | `poliseek get <id>` | Print a document's metadata, body, and chunks |
//! | `poliseek status <id>` | Show derived embedding progress |
//! | `poliseek set-status <id> <status>` | Apply a lifecycle transition |
//! | `poliseek search "<query>"` | Hybrid retrieval over indexed chunks |
//! | `poliseek serve` | Start the HTTP API server |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use poliseek::config::{self, Config};
use poliseek::db;
use poliseek::embedding::{create_provider, EmbeddingProvider};
use poliseek::extract::{PlainTextExtractor, TextExtractor};
use poliseek::ingest::{self, NewDocument};
use poliseek::migrate;
use poliseek::models::{DocumentStatus, EmbedOutcome, EmbedReport};
use poliseek::search::{hybrid_search, SearchParams};
use poliseek::server;
use poliseek::store::sqlite::SqliteStore;
use poliseek::store::Store;

/// Poliseek — hybrid retrieval engine for policy documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with `[db]`, `[chunking]`, `[retrieval]`, `[embedding]`, and
/// `[server]` sections.
#[derive(Parser)]
#[command(
    name = "poliseek",
    about = "Poliseek — hybrid retrieval engine for policy documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/poliseek.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chunks, chunks_fts). Idempotent — running it multiple
    /// times is safe.
    Init,

    /// Register a plain-text document.
    ///
    /// Reads the file, runs it through the text-extraction seam, and
    /// stores a document row. Prints the new document id; run `ingest`
    /// next to chunk and embed it.
    Add {
        /// Path to the extracted plain-text file.
        path: PathBuf,

        /// Document title. Defaults to the file stem.
        #[arg(long)]
        title: Option<String>,

        /// Lifecycle status: draft, review, published, or archived.
        #[arg(long, default_value = "draft")]
        status: String,

        /// Free-text description.
        #[arg(long)]
        description: Option<String>,

        /// Version label (e.g. "2.1").
        #[arg(long)]
        version: Option<String>,

        /// Date the policy takes effect (YYYY-MM-DD).
        #[arg(long)]
        effective_date: Option<String>,

        /// Date the policy is due for review (YYYY-MM-DD).
        #[arg(long)]
        review_date: Option<String>,
    },

    /// Chunk (if not already chunked) and embed a document.
    ///
    /// Prints the `{successful, failed, errors}` summary. Exits non-zero
    /// when every chunk fails; a partial run exits zero but reports the
    /// failed chunks.
    Ingest {
        /// Document id.
        id: String,
    },

    /// Print a document's metadata, body, and chunks.
    Get {
        /// Document id.
        id: String,
    },

    /// Show embedding progress for a document.
    Status {
        /// Document id.
        id: String,
    },

    /// Apply a lifecycle transition to a document.
    ///
    /// Archived documents stay in the store but disappear from search.
    SetStatus {
        /// Document id.
        id: String,
        /// New status: draft, review, published, or archived.
        status: String,
    },

    /// Search indexed chunks.
    ///
    /// Runs the full hybrid retrieval: query embedding, vector and
    /// lexical search in parallel, reciprocal rank fusion.
    Search {
        /// The search query string.
        query: String,
    },

    /// Start the HTTP API server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            path,
            title,
            status,
            description,
            version,
            effective_date,
            review_date,
        } => {
            run_add(
                &cfg,
                &path,
                title,
                &status,
                description,
                version,
                effective_date,
                review_date,
            )
            .await?;
        }
        Commands::Ingest { id } => {
            run_ingest_cmd(&cfg, &id).await?;
        }
        Commands::Get { id } => {
            run_get_cmd(&cfg, &id).await?;
        }
        Commands::Status { id } => {
            let pool = db::connect(&cfg).await?;
            let store = SqliteStore::new(pool);
            let status = ingest::embedding_status(&store, &id).await?;
            println!("document {}", id);
            println!("  embedded: {}", status.embedded);
            println!("  total: {}", status.total);
            println!("  complete: {}", status.complete);
        }
        Commands::SetStatus { id, status } => {
            let new_status: DocumentStatus = status.parse()?;
            let pool = db::connect(&cfg).await?;
            let store = SqliteStore::new(pool);
            if !store.update_document_status(&id, new_status).await? {
                anyhow::bail!("document not found: {}", id);
            }
            println!("document {} -> {}", id, new_status);
        }
        Commands::Search { query } => {
            run_search_cmd(&cfg, &query).await?;
        }
        Commands::Serve => {
            let pool = db::connect(&cfg).await?;
            let store = Arc::new(SqliteStore::new(pool));
            let provider: Arc<dyn EmbeddingProvider> =
                Arc::from(create_provider(&cfg.embedding)?);
            server::run_server(&cfg, store, provider).await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_add(
    cfg: &Config,
    path: &PathBuf,
    title: Option<String>,
    status: &str,
    description: Option<String>,
    version: Option<String>,
    effective_date: Option<String>,
    review_date: Option<String>,
) -> Result<()> {
    let status: DocumentStatus = status.parse()?;
    let bytes = std::fs::read(path)?;
    let body = PlainTextExtractor.extract(&bytes, "text/plain")?;

    let title = title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string())
    });

    let pool = db::connect(cfg).await?;
    let store = SqliteStore::new(pool);

    let doc = ingest::register_document(
        &store,
        NewDocument {
            title,
            status: Some(status),
            description,
            version,
            effective_date,
            review_date,
            storage_path: Some(path.display().to_string()),
        },
        body,
    )
    .await?;

    println!("added document");
    println!("  id: {}", doc.id);
    println!("  title: {}", doc.title);
    println!("  status: {}", doc.status);
    Ok(())
}

async fn run_ingest_cmd(cfg: &Config, id: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let store = SqliteStore::new(pool);
    let provider = create_provider(&cfg.embedding)?;

    let report = ingest::run_ingest(&store, provider.as_ref(), cfg, id).await?;
    print_report(id, &report);

    match report.outcome() {
        EmbedOutcome::Failure => {
            anyhow::bail!("embedding failed for all {} chunks", report.failed)
        }
        _ => Ok(()),
    }
}

fn print_report(id: &str, report: &EmbedReport) {
    println!("ingest {}", id);
    println!("  successful: {}", report.successful);
    println!("  failed: {}", report.failed);
    for err in &report.errors {
        eprintln!("  warning: {}", err);
    }
}

async fn run_get_cmd(cfg: &Config, id: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let store = SqliteStore::new(pool);

    let doc = match store.get_document(id).await? {
        Some(doc) => doc,
        None => anyhow::bail!("document not found: {}", id),
    };
    let chunks = store.document_chunks(id).await?;

    println!("--- Document ---");
    println!("id:             {}", doc.id);
    println!("title:          {}", doc.title);
    println!("status:         {}", doc.status);
    if let Some(ref description) = doc.description {
        println!("description:    {}", description);
    }
    if let Some(ref version) = doc.version {
        println!("version:        {}", version);
    }
    if let Some(ref date) = doc.effective_date {
        println!("effective_date: {}", date);
    }
    if let Some(ref date) = doc.review_date {
        println!("review_date:    {}", date);
    }
    if let Some(ref path) = doc.storage_path {
        println!("storage_path:   {}", path);
    }
    println!();

    println!("--- Body ---");
    println!("{}", doc.body);
    println!();

    println!("--- Chunks ({}) ---", chunks.len());
    for chunk in &chunks {
        println!("[chunk {}]", chunk.chunk_index);
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}

async fn run_search_cmd(cfg: &Config, query: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let store = SqliteStore::new(pool);
    let provider = create_provider(&cfg.embedding)?;
    let params = SearchParams::from(&cfg.retrieval);

    let results = hybrid_search(&store, provider.as_ref(), query, &params).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.5}] {} ({})",
            i + 1,
            result.score,
            result.document_title,
            result.document_status
        );
        if let Some(similarity) = result.similarity {
            println!("    similarity: {:.3}", similarity);
        }
        if let Some(rank) = result.rank {
            println!("    rank: {:.3}", rank);
        }
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.text).replace('\n', " ")
        );
        println!("    chunk: {}", result.chunk_id);
        println!();
    }

    Ok(())
}

/// First 240 chars of a chunk for display.
fn excerpt(text: &str) -> String {
    text.chars().take(240).collect()
}
