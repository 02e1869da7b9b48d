//! `grna ingest` / `grna ingest-json`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use grna_db::VectorStore;
use grna_ingestion::loader::{load_json_records, load_plasmid_tsv};
use grna_ingestion::transform::{json_to_documents, plasmids_to_documents};
use grna_ingestion::{ingest_documents, IngestMode, IngestionReport};
use tracing::info;

use crate::config::Config;

fn mode(append: bool) -> IngestMode {
    if append { IngestMode::Append } else { IngestMode::Replace }
}

fn log_report(report: &IngestionReport) {
    info!(
        collection = %report.collection,
        before = report.count_before,
        after = report.count_after,
        inserted = report.inserted.documents,
        batches = report.inserted.batches,
        created = report.was_created,
        "Ingestion finished"
    );
}

pub async fn run_tsv(
    store: &dyn VectorStore,
    config: &Config,
    file: Option<PathBuf>,
    append: bool,
) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(|| PathBuf::from(&config.ingestion.data_file));
    let records = load_plasmid_tsv(&path)
        .with_context(|| format!("loading plasmid snapshot {}", path.display()))?;
    let documents = plasmids_to_documents(&records)?;
    info!(documents = documents.len(), "Prepared plasmid documents");

    let report = ingest_documents(
        store,
        &config.ingestion.plasmid_collection,
        &config.ingestion.plasmid_description,
        &documents,
        mode(append),
        config.ingestion.batch_size,
    )
    .await
    .with_context(|| format!("ingesting into '{}'", config.ingestion.plasmid_collection))?;
    log_report(&report);
    Ok(())
}

pub async fn run_json(
    store: &dyn VectorStore,
    config: &Config,
    file: &Path,
    key: Option<String>,
    collection: Option<String>,
    append: bool,
) -> anyhow::Result<()> {
    let key = key.unwrap_or_else(|| config.ingestion.json_key.clone());
    let records = load_json_records(file, &key)
        .with_context(|| format!("loading JSON records from {}", file.display()))?;
    let documents = json_to_documents(&records)?;
    info!(documents = documents.len(), key = %key, "Prepared JSON documents");

    let name = collection.unwrap_or_else(|| config.ingestion.plasmid_collection.clone());
    let report = ingest_documents(
        store,
        &name,
        &config.ingestion.plasmid_description,
        &documents,
        mode(append),
        config.ingestion.batch_size,
    )
    .await
    .with_context(|| format!("ingesting into '{name}'"))?;
    log_report(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grna_db::MemoryStore;
    use grna_test_utils::fixtures::{write_tsv, TWO_ROWS};

    #[tokio::test]
    async fn test_tsv_replace_then_append() {
        let store = MemoryStore::new();
        let config = Config::default();
        let file = write_tsv(&TWO_ROWS);

        run_tsv(&store, &config, Some(file.path().to_path_buf()), false).await.unwrap();
        run_tsv(&store, &config, Some(file.path().to_path_buf()), false).await.unwrap();
        let coll = store.get_collection("grna_addgene").await.unwrap();
        pretty_assertions::assert_eq!(store.count(&coll).await.unwrap(), 2);

        let err = run_tsv(&store, &config, Some(file.path().to_path_buf()), true).await.unwrap_err();
        assert!(format!("{err:#}").contains("ingesting into 'grna_addgene'"));
    }

    #[tokio::test]
    async fn test_missing_file_names_path() {
        let store = MemoryStore::new();
        let err = run_tsv(&store, &Config::default(), Some(PathBuf::from("/nonexistent/x.tsv")), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/x.tsv"));
    }

    #[tokio::test]
    async fn test_json_into_named_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"{"plasmids": [{"id": "p1", "target": "EMX1"}, {"id": 2, "target": "ADE2"}]}"#,
        )
        .unwrap();

        let store = MemoryStore::new();
        run_json(&store, &Config::default(), &path, None, Some("extra".into()), false).await.unwrap();
        let coll = store.get_collection("extra").await.unwrap();
        pretty_assertions::assert_eq!(store.count(&coll).await.unwrap(), 2);
    }
}
