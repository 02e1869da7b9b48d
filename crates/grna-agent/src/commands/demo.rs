//! `grna demo`: canned similarity and metadata queries.

use std::io::Write;
use std::sync::Arc;

use grna_db::{MetadataFilter, VectorStore};
use grna_query::{QueryInterface, SearchResult};
use tracing::error;

use crate::config::{Config, QueryConfig};

pub const DEMO_QUERIES: [&str; 7] = [
    "CRISPR Cas9 human genome editing",
    "EGFP fluorescent protein",
    "AAVS1 safe harbor locus",
    "mouse gene knockout",
    "yeast genetic engineering",
    "plant genome editing",
    "bacterial CRISPR applications",
];

const SEQUENCE_PREVIEW: usize = 30;

pub async fn run(store: Arc<dyn VectorStore>, config: &Config) -> anyhow::Result<()> {
    let query = super::query::connect(store, config).await?;
    run_demo(&query, &mut std::io::stdout(), &config.query).await
}

pub async fn run_demo<W: Write>(
    query: &QueryInterface,
    out: &mut W,
    cfg: &QueryConfig,
) -> anyhow::Result<()> {
    writeln!(out, "🧬 gRNA Addgene RAG System Demo")?;
    writeln!(out, "{}", "=".repeat(50))?;

    for (i, text) in DEMO_QUERIES.iter().enumerate() {
        writeln!(out, "\n{}. Query: '{text}'", i + 1)?;
        writeln!(out, "{}", "-".repeat(40))?;
        match query.search(text, cfg.demo_k).await {
            Ok(results) if results.is_empty() => writeln!(out, "No results found.")?,
            Ok(results) => {
                for (j, r) in results.iter().enumerate() {
                    write_hit(out, j + 1, r)?;
                }
            }
            Err(e) => error!(query = %text, "Demo query failed: {e}"),
        }
    }

    writeln!(out, "\n{}", "=".repeat(50))?;
    writeln!(out, "🔍 Metadata Search Examples")?;
    writeln!(out, "{}", "=".repeat(50))?;

    let searches = [
        ("Human gRNAs", "species", "H. sapiens", "application"),
        ("Cutting applications", "application", "cut", "species"),
    ];
    for (title, key, value, detail) in searches {
        writeln!(out, "\n{title}:")?;
        let filter = MetadataFilter::new().eq(key, value);
        match query.search_by_metadata(&filter, cfg.demo_filter_k).await {
            Ok(results) => {
                for r in &results {
                    writeln!(out, "  - {} ({})", r.field_or_na("target"), r.field_or_na(detail))?;
                }
            }
            Err(e) => error!(filter = %filter, "Metadata search failed: {e}"),
        }
    }
    Ok(())
}

fn write_hit<W: Write>(out: &mut W, rank: usize, r: &SearchResult) -> std::io::Result<()> {
    match r.similarity() {
        Some(score) => writeln!(out, "\nResult {rank} (Score: {score:.3}):")?,
        None => writeln!(out, "\nResult {rank}:")?,
    }
    writeln!(out, "  Target: {}", r.field_or_na("target"))?;
    writeln!(out, "  Species: {}", r.field_or_na("species"))?;
    writeln!(out, "  Application: {}", r.field_or_na("application"))?;
    let sequence = r.field_or_na("grna_sequence");
    let preview: String = sequence.chars().take(SEQUENCE_PREVIEW).collect();
    writeln!(out, "  gRNA: {preview}...")
}
