//! # DocVault CLI (`dv`)
//!
//! The `dv` binary is the primary interface for DocVault. It provides
//! commands for collection setup, document ingestion, tenant-scoped search,
//! metadata management, and context assembly.
//!
//! ## Usage
//!
//! ```bash
//! dv --config ./config/dv.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dv init` | Create the vector collection |
//! | `dv recreate` | Drop and recreate the collection, discarding all points |
//! | `dv ingest <folder> --tenant <t>` | Bulk-load every supported file in a folder |
//! | `dv add <file> --tenant <t>` | Store one file as a whole-document point |
//! | `dv search "<query>" --tenant <t>` | Similarity search within a tenant |
//! | `dv get <id> --tenant <t>` | Print a point the tenant owns |
//! | `dv list --tenant <t>` | Enumerate a tenant's stored points |
//! | `dv context --tenant <t>` | Assemble a tenant's documents into one block |
//! | `dv update <id> --tenant <t> --meta k=v` | Merge metadata into an owned point |
//! | `dv delete <id> --tenant <t>` | Delete an owned point |
//! | `dv stats` | Print collection-wide counts |
//!
//! ## Examples
//!
//! ```bash
//! # Create the collection
//! dv init --config ./config/dv.toml
//!
//! # Ingest a folder of notes for one tenant
//! dv ingest ./notes --tenant alice
//!
//! # Search with a metadata filter
//! dv search "entropy" --tenant alice --filter course=physics --limit 5
//!
//! # Assemble up to 50000 characters of context
//! dv context --tenant alice --max-chars 50000
//! ```

mod chunk;
mod collection;
mod config;
mod context;
mod embedding;
mod engine;
mod extract;
mod ingest;
mod models;
mod stats;
mod store;
mod store_memory;
#[cfg(feature = "qdrant")]
mod store_qdrant;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::engine::{RetrievalEngine, SearchQuery};
use crate::models::MutationOutcome;

/// DocVault CLI — a multi-tenant document vault with vector retrieval.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults (in-memory store, embedding
/// disabled).
#[derive(Parser)]
#[command(
    name = "dv",
    about = "DocVault — a multi-tenant document vault with vector retrieval",
    version,
    long_about = "DocVault ingests documents (text, PDF, Office files, JSON), chunks and embeds \
    them, and stores them per tenant in a vector store. It offers tenant-scoped similarity \
    search, ownership-checked metadata updates and deletes, and character-budgeted context \
    assembly."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dv.toml`. Store, chunking, embedding, retrieval,
    /// and context settings are read from this file.
    #[arg(long, global = true, default_value = "./config/dv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the vector collection.
    ///
    /// Creates the configured collection with the configured vector width
    /// and the tenant payload index. Idempotent — running it multiple times
    /// is safe.
    Init,

    /// Drop and recreate the collection.
    ///
    /// Discards every stored point for every tenant. A missing collection
    /// is not an error.
    Recreate,

    /// Bulk-load every supported file in a folder for one tenant.
    ///
    /// Files are extracted, chunked into overlapping word windows, embedded,
    /// and stored one point per chunk. Unsupported and unreadable files are
    /// skipped and counted; embedding failures store zero-vector points
    /// flagged as degraded.
    Ingest {
        /// Folder to scan (non-recursive).
        folder: PathBuf,

        /// Tenant that will own the ingested points.
        #[arg(long)]
        tenant: String,
    },

    /// Store one file as a whole-document point.
    ///
    /// The stored content is a bounded preview of the extracted text; the
    /// embedding covers the full (middle-elided) text. Prints the new
    /// point's id.
    Add {
        /// File to store.
        file: PathBuf,

        /// Tenant that will own the point.
        #[arg(long)]
        tenant: String,

        /// Extra metadata as `key=value` pairs, merged into the payload.
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Similarity search within one tenant's points.
    ///
    /// Embeds the query, searches the collection with the tenant filter, and
    /// prints ranked results above the configured score threshold.
    Search {
        /// The search query string.
        query: String,

        /// Tenant whose points to search.
        #[arg(long)]
        tenant: String,

        /// Extra exact-match payload filters as `key=value` pairs.
        /// Values may be strings, integers, or booleans.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filter: Vec<(String, String)>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Retrieve a point the tenant owns.
    ///
    /// Prints the point's metadata and stored content. A missing point and a
    /// point owned by another tenant report the same outcome.
    Get {
        /// Point id as printed by `add`, `search`, or `list`.
        point_id: String,

        /// Tenant claiming ownership.
        #[arg(long)]
        tenant: String,
    },

    /// Enumerate a tenant's stored points.
    List {
        /// Tenant whose points to list.
        #[arg(long)]
        tenant: String,

        /// Maximum number of points to list.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Assemble a tenant's documents into one bounded context block.
    ///
    /// Points are grouped by source file with `=== filename ===` headers and
    /// cut to the character budget. The block is printed to stdout.
    Context {
        /// Tenant whose documents to assemble.
        #[arg(long)]
        tenant: String,

        /// Character budget override (defaults to `[context].max_chars`).
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Merge metadata into a point the tenant owns.
    ///
    /// A missing point and a point owned by another tenant report the same
    /// outcome.
    Update {
        /// Point id as printed by `add`, `search`, or `list`.
        point_id: String,

        /// Tenant claiming ownership.
        #[arg(long)]
        tenant: String,

        /// Metadata as `key=value` pairs.
        #[arg(long = "meta", value_parser = parse_key_val, required = true)]
        meta: Vec<(String, String)>,
    },

    /// Delete a point the tenant owns.
    Delete {
        /// Point id.
        point_id: String,

        /// Tenant claiming ownership.
        #[arg(long)]
        tenant: String,
    },

    /// Print collection-wide counts.
    Stats,
}

/// Parse a `key=value` pair for `--meta` and `--filter` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Interpret a CLI value as JSON when it parses as such, else as a string.
/// Lets `--meta pages=12` store a number and `--filter course=math` match a
/// string.
fn to_json_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn load_config(path: &PathBuf) -> Result<config::Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(config::Config::default())
    }
}

fn build_engine(cfg: &config::Config) -> Result<RetrievalEngine> {
    let store = store::open_store(&cfg.store)?;
    let gateway: Arc<dyn embedding::EmbeddingGateway> =
        Arc::from(embedding::create_gateway(&cfg.embedding)?);
    Ok(RetrievalEngine::new(
        store,
        gateway,
        cfg.store.collection.clone(),
        cfg.embedding.dimension,
        cfg.retrieval.score_threshold,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let engine = build_engine(&cfg)?;

    match cli.command {
        Commands::Init => {
            collection::ensure(engine.store(), engine.collection(), engine.dimension()).await?;
            println!("Collection '{}' ready.", engine.collection());
        }
        Commands::Recreate => {
            collection::recreate(engine.store(), engine.collection(), engine.dimension()).await?;
            println!("Collection '{}' recreated, all points discarded.", engine.collection());
        }
        Commands::Ingest { folder, tenant } => {
            collection::ensure(engine.store(), engine.collection(), engine.dimension()).await?;
            let report = ingest::ingest_folder(&engine, &folder, &tenant, &cfg.chunking).await?;
            println!(
                "Ingested {} files ({} points, {} degraded, {} skipped) for tenant '{}'.",
                report.files, report.points, report.degraded, report.skipped, tenant
            );
        }
        Commands::Add { file, tenant, meta } => {
            collection::ensure(engine.store(), engine.collection(), engine.dimension()).await?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read file: {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let extra: BTreeMap<String, serde_json::Value> = meta
                .into_iter()
                .map(|(k, v)| (k, to_json_value(&v)))
                .collect();
            let id = ingest::add_file(&engine, &tenant, &bytes, &filename, extra).await?;
            println!("{}", id);
        }
        Commands::Search {
            query,
            tenant,
            filter,
            limit,
        } => {
            let filters: Vec<(String, serde_json::Value)> = filter
                .into_iter()
                .map(|(k, v)| (k, to_json_value(&v)))
                .collect();
            let hits = engine
                .search(
                    &tenant,
                    SearchQuery::Text(query),
                    &filters,
                    limit.unwrap_or(cfg.retrieval.limit),
                )
                .await;

            if hits.is_empty() {
                println!("No results.");
            }
            for (rank, hit) in hits.iter().enumerate() {
                let chunk = hit
                    .payload
                    .chunk_index
                    .map(|i| format!(" chunk {}", i))
                    .unwrap_or_default();
                let snippet: String = hit.payload.content.chars().take(160).collect();
                println!(
                    "{}. [{:.3}] {}{} ({})\n   {}",
                    rank + 1,
                    hit.score,
                    hit.payload.filename,
                    chunk,
                    hit.id,
                    snippet.replace('\n', " ")
                );
            }
        }
        Commands::Get { point_id, tenant } => {
            match engine.get(&tenant, &point_id).await? {
                Some(record) => {
                    let p = &record.payload;
                    println!("Id: {}", record.id);
                    println!("File: {} ({})", p.filename, p.file_type);
                    if let Some(index) = p.chunk_index {
                        println!("Chunk: {}", index);
                    }
                    println!("Size: {} bytes, {} chars", p.file_size, p.text_length);
                    println!("Uploaded: {}", p.uploaded_at);
                    if p.degraded {
                        println!("Degraded: stored without a usable embedding");
                    }
                    for (key, value) in &p.extra {
                        println!("{}: {}", key, value);
                    }
                    println!("---");
                    println!("{}", p.content);
                }
                None => println!("Point {} not found for tenant '{}'.", point_id, tenant),
            }
        }
        Commands::List { tenant, limit } => {
            let hits = engine
                .list_by_tenant(&tenant, limit.unwrap_or(100_000))
                .await;
            if hits.is_empty() {
                println!("No points for tenant '{}'.", tenant);
            }
            for hit in hits {
                let chunk = hit
                    .payload
                    .chunk_index
                    .map(|i| format!(" chunk {}", i))
                    .unwrap_or_default();
                let degraded = if hit.payload.degraded { " [degraded]" } else { "" };
                println!("{}  {}{}{}", hit.id, hit.payload.filename, chunk, degraded);
            }
        }
        Commands::Context { tenant, max_chars } => {
            let bundle = context::tenant_context(
                &engine,
                &tenant,
                max_chars.unwrap_or(cfg.context.max_chars),
                cfg.context.per_source_cap,
            )
            .await;
            println!("{}", bundle.context);
            eprintln!(
                "{} chars from {} source file(s).",
                bundle.total_chars,
                bundle.sources.len()
            );
        }
        Commands::Update {
            point_id,
            tenant,
            meta,
        } => {
            let patch: BTreeMap<String, serde_json::Value> = meta
                .into_iter()
                .map(|(k, v)| (k, to_json_value(&v)))
                .collect();
            match engine.update_metadata(&tenant, &point_id, &patch).await? {
                MutationOutcome::Applied => println!("Updated {}.", point_id),
                MutationOutcome::NotFoundOrDenied => {
                    println!("Point {} not found for tenant '{}'.", point_id, tenant)
                }
            }
        }
        Commands::Delete { point_id, tenant } => {
            match engine.delete(&tenant, &point_id).await? {
                MutationOutcome::Applied => println!("Deleted {}.", point_id),
                MutationOutcome::NotFoundOrDenied => {
                    println!("Point {} not found for tenant '{}'.", point_id, tenant)
                }
            }
        }
        Commands::Stats => {
            let stats = stats::collect(&engine).await?;
            println!("Collection: {}", stats.collection);
            println!("Points: {}", stats.points);
        }
    }

    Ok(())
}
