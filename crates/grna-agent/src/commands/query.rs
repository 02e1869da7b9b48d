//! `grna query`: one-shot search or the interactive loop.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use grna_db::{MetadataFilter, VectorStore};
use grna_query::render::render_report;
use grna_query::QueryInterface;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::error;

use crate::config::{Config, QueryConfig};

const HELP: &str = "\nCommands:
  /help     - Show this help message
  /info     - Show collection information
  /species  - Search by species
  /target   - Search by target gene
  /quit     - Exit the interface

Or just type your search query!";

pub async fn connect(store: Arc<dyn VectorStore>, config: &Config) -> anyhow::Result<QueryInterface> {
    let name = &config.ingestion.plasmid_collection;
    QueryInterface::connect(store, name)
        .await
        .with_context(|| format!("opening collection '{name}'; has it been ingested?"))
}

pub async fn run(store: Arc<dyn VectorStore>, config: &Config, text: Vec<String>) -> anyhow::Result<()> {
    let query = connect(store, config).await?;
    let mut stdout = std::io::stdout();

    if !text.is_empty() {
        let text = text.join(" ");
        let results = query.search(&text, config.query.k).await?;
        writeln!(stdout, "{}", render_report(&results, &text))?;
        return Ok(());
    }

    let stdin = BufReader::new(tokio::io::stdin());
    run_repl(&query, stdin, &mut stdout, &config.query).await
}

async fn read_line<R: AsyncBufRead + Unpin>(lines: &mut tokio::io::Lines<R>) -> anyhow::Result<Option<String>> {
    Ok(lines.next_line().await?.map(|l| l.trim().to_string()))
}

/// Line-oriented loop until `/quit` or end of input.
pub async fn run_repl<R, W>(
    query: &QueryInterface,
    input: R,
    out: &mut W,
    cfg: &QueryConfig,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "🧬 gRNA Addgene RAG System Query Interface")?;
    writeln!(out, "{}", "=".repeat(50))?;
    write_info(query, out, "Connected to collection", "Total documents").await?;
    writeln!(out, "{HELP}")?;

    let mut lines = input.lines();
    loop {
        write!(out, "\n🔍 Query: ")?;
        out.flush()?;
        let Some(line) = read_line(&mut lines).await? else { break };
        if line.is_empty() {
            continue;
        }

        let filter_prompt = match line.to_lowercase().as_str() {
            "/quit" => {
                writeln!(out, "Goodbye! 👋")?;
                return Ok(());
            }
            "/help" => {
                writeln!(out, "{HELP}")?;
                continue;
            }
            "/info" => {
                write_info(query, out, "\nCollection", "Documents").await?;
                continue;
            }
            "/species" => Some(("species", "Enter species (e.g., H. sapiens, M. musculus): ")),
            "/target" => Some(("target", "Enter target gene (e.g., AAVS1, EGFP): ")),
            _ => None,
        };

        let outcome = match filter_prompt {
            Some((key, prompt)) => {
                write!(out, "{prompt}")?;
                out.flush()?;
                let Some(value) = read_line(&mut lines).await? else { break };
                if value.is_empty() {
                    continue;
                }
                let filter = MetadataFilter::new().eq(key, value.as_str());
                query
                    .search_by_metadata(&filter, cfg.filter_k)
                    .await
                    .map(|r| render_report(&r, &filter.to_string()))
            }
            None => query.search(&line, cfg.k).await.map(|r| render_report(&r, &line)),
        };
        match outcome {
            Ok(report) => writeln!(out, "{report}")?,
            Err(e) => error!("Error: {e}"),
        }
    }

    writeln!(out, "\n\nGoodbye! 👋")?;
    Ok(())
}

async fn write_info<W: Write>(
    query: &QueryInterface,
    out: &mut W,
    name_label: &str,
    count_label: &str,
) -> anyhow::Result<()> {
    match query.info().await {
        Ok(info) => {
            writeln!(out, "{name_label}: {}", info.name)?;
            writeln!(out, "{count_label}: {}", info.document_count)?;
            writeln!(out, "Description: {}", info.description.as_deref().unwrap_or("N/A"))?;
        }
        Err(e) => error!("Error getting collection info: {e}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grna_common::{Document, Metadata, MetadataValue};
    use grna_db::MemoryStore;

    async fn interface() -> QueryInterface {
        let store = MemoryStore::new();
        let coll = store.ensure("grna_addgene", "gRNA Addgene database for CRISPR applications").await.unwrap().collection;
        let docs: Vec<Document> = [("AAVS1", "H. sapiens"), ("EGFP", "M. musculus")]
            .iter()
            .enumerate()
            .map(|(i, (target, species))| {
                let mut meta = Metadata::new();
                meta.insert("target".into(), MetadataValue::from(*target));
                meta.insert("species".into(), MetadataValue::from(*species));
                Document::new(format!("entry_{i}"), format!("Target: {target} | Species: {species}"), meta).unwrap()
            })
            .collect();
        store.add(&coll, &docs).await.unwrap();
        QueryInterface::connect(Arc::new(store), "grna_addgene").await.unwrap()
    }

    async fn session(input: &str) -> String {
        let query = interface().await;
        let mut out = Vec::new();
        run_repl(&query, input.as_bytes(), &mut out, &QueryConfig::default()).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_repl_commands() {
        let out = session("/info\n\n/species\nM. musculus\n/QUIT\nnever reached\n").await;
        assert!(out.contains("Connected to collection: grna_addgene"));
        assert!(out.contains("Documents: 2"));
        assert!(out.contains("Found 1 results for query: 'species = M. musculus'"));
        assert!(out.contains("Document: Target: EGFP | Species: M. musculus"));
        assert!(out.trim_end().ends_with("Goodbye! 👋"));
        assert!(!out.contains("never reached"));
    }

    #[tokio::test]
    async fn test_repl_free_text_and_eof() {
        let out = session("EGFP\n/target\nnothing\n").await;
        assert!(out.contains("results for query: 'EGFP'"));
        assert!(out.contains("Similarity Score:"));
        assert!(out.contains("No results found for query: 'target = nothing'"));
        assert!(out.trim_end().ends_with("Goodbye! 👋"));
    }
}
