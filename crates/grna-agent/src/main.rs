//! grna: gRNA plasmid RAG corpus: ingestion, PubMed sync, retrieval.
//! Entry point for the command-line binary.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use grna_db::{ChromaStore, Embedder, EmbeddingClient, VectorStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::commands::ask::BackendChoice;

#[derive(Debug, Parser)]
#[command(name = "grna", version, about = "gRNA plasmid retrieval corpus")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replace the plasmid corpus with an Addgene TSV snapshot.
    Ingest {
        /// Defaults to `ingestion.data_file`.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Add to the existing collection instead of replacing it.
        #[arg(long)]
        append: bool,
    },
    /// Ingest a JSON dump of records keyed by `id`.
    IngestJson {
        #[arg(long)]
        file: PathBuf,
        /// Top-level key holding the record list.
        #[arg(long)]
        key: Option<String>,
        /// Target collection; defaults to the plasmid collection.
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        append: bool,
    },
    /// Fetch abstracts for publications referenced by the plasmid corpus.
    Sync,
    /// Search the plasmid corpus; interactive when no text is given.
    Query {
        text: Vec<String>,
    },
    /// Answer a question with retrieved plasmid records as context.
    Ask {
        question: Vec<String>,
        #[arg(long, value_enum)]
        backend: Option<BackendChoice>,
    },
    /// Run the canned demo queries.
    Demo,
}

async fn build_store(config: &config::Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let embedder: Option<Arc<dyn Embedder>> = match config.store.embedding {
        Some(ref cfg) => {
            info!(backend = ?cfg.backend, model = %cfg.model, "Using client-side embeddings");
            Some(Arc::new(EmbeddingClient::new(cfg.clone())?))
        }
        None => None,
    };
    let chroma = config.store.chroma();
    let endpoint = chroma.base_url();
    let store = ChromaStore::new(chroma, embedder)?;
    store
        .heartbeat()
        .await
        .with_context(|| format!("ChromaDB is not reachable at {endpoint}; make sure it is running"))?;
    info!(endpoint = %endpoint, "Connected to ChromaDB");
    Ok(Arc::new(store))
}

async fn run(cli: Cli, config: config::Config) -> anyhow::Result<()> {
    let store = build_store(&config).await?;
    match cli.command {
        Command::Ingest { file, append } => {
            commands::ingest::run_tsv(store.as_ref(), &config, file, append).await
        }
        Command::IngestJson { file, key, collection, append } => {
            commands::ingest::run_json(store.as_ref(), &config, &file, key, collection, append).await
        }
        Command::Sync => commands::sync::run(store.as_ref(), &config).await,
        Command::Query { text } => commands::query::run(store, &config, text).await,
        Command::Ask { question, backend } => {
            commands::ask::run(store, &config, question, backend).await
        }
        Command::Demo => commands::demo::run(store, &config).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("grna=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load()?;
    if let Err(e) = run(cli, config).await {
        error!("{e:#}");
        return Err(e);
    }
    Ok(())
}
