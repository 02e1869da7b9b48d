//! End-to-end ingestion and sync runs.
//!
//!   ingest:  documents → (drop) → ensure → batch insert
//!   sync:    primary + secondary → CrossRefSync → batch insert → aliases → count
//!
//! The store is the only state; every run re-derives what it needs.

use std::collections::BTreeMap;
use std::sync::Arc;

use grna_common::{Document, MetadataValue};
use grna_db::{Collection, DbError, VectorStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::batch::{insert_in_batches, BatchReport, DEFAULT_BATCH_SIZE};
use crate::error::Result;
use crate::models::{
    split_source_ids, ABSTRACT_COLLECTION, ABSTRACT_DESCRIPTION, PLASMID_COLLECTION,
    SOURCE_ID_SEPARATOR,
};
use crate::sources::BibliographicSource;
use crate::sync::{CrossRefSync, StoredAlias, SyncReport, PUBLICATION_FIELD};

// ── Ingestion ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Drop the collection first; the snapshot becomes the whole corpus.
    #[default]
    Replace,
    /// Add to whatever is there. Repeated ids fail with `DuplicateId`.
    Append,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub collection: String,
    pub was_created: bool,
    pub count_before: usize,
    pub count_after: usize,
    pub inserted: BatchReport,
}

#[instrument(skip(store, description, documents), fields(n = documents.len()))]
pub async fn ingest_documents(
    store: &dyn VectorStore,
    name: &str,
    description: &str,
    documents: &[Document],
    mode: IngestMode,
    batch_size: usize,
) -> Result<IngestionReport> {
    let count_before = match store.get_collection(name).await {
        Ok(existing) => store.count(&existing).await?,
        Err(DbError::NotFound(_)) => 0,
        Err(e) => return Err(e.into()),
    };
    info!(collection = name, count_before, ?mode, "Starting ingestion");

    if mode == IngestMode::Replace && store.drop_collection(name).await? {
        info!(collection = name, "Dropped existing collection for full replace");
    }

    let ensured = store.ensure(name, description).await?;
    let inserted = insert_in_batches(store, &ensured.collection, documents, batch_size).await?;
    let count_after = store.count(&ensured.collection).await?;
    info!(collection = name, count_after, batches = inserted.batches, "Ingestion complete");

    Ok(IngestionReport {
        collection: name.to_string(),
        was_created: ensured.was_created,
        count_before,
        count_after,
        inserted,
    })
}

// ── Sync ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    pub primary_collection: String,
    pub secondary_collection: String,
    pub secondary_description: String,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            primary_collection: PLASMID_COLLECTION.to_string(),
            secondary_collection: ABSTRACT_COLLECTION.to_string(),
            secondary_description: ABSTRACT_DESCRIPTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub report: SyncReport,
    pub inserted: BatchReport,
    /// Stored abstracts that gained a new spelling.
    pub aliases_recorded: usize,
    pub final_count: usize,
}

/// Bring the abstract corpus up to date with the plasmid corpus.
///
/// # Errors
/// `NotFound` when the primary collection does not exist; store failures;
/// batch failures. Per-identifier fetch failures are reported, not raised.
#[instrument(skip(store, source, settings), fields(primary = %settings.primary_collection))]
pub async fn run_sync<S>(
    store: &dyn VectorStore,
    source: Arc<S>,
    settings: &SyncSettings,
) -> Result<SyncSummary>
where
    S: BibliographicSource + ?Sized,
{
    let primary = store.get_collection(&settings.primary_collection).await?;
    let secondary = store
        .ensure(&settings.secondary_collection, &settings.secondary_description)
        .await?
        .collection;

    let primary_docs = store.get_all(&primary).await?;
    let secondary_docs = store.get_all(&secondary).await?;
    info!(
        primary = primary_docs.len(),
        secondary = secondary_docs.len(),
        "Loaded corpora"
    );

    let outcome = CrossRefSync::new(source)
        .with_concurrency(settings.concurrency)
        .run(&primary_docs, &secondary_docs)
        .await;

    let documents = outcome
        .records
        .iter()
        .map(|r| r.to_document())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let inserted = insert_in_batches(store, &secondary, &documents, settings.batch_size).await?;
    let aliases_recorded = record_aliases(store, &secondary, &secondary_docs, &outcome.aliases).await?;
    let final_count = store.count(&secondary).await?;
    info!(
        collection = %secondary.name,
        inserted = inserted.documents,
        aliases_recorded,
        final_count,
        failures = outcome.report.failures.len(),
        "Sync complete"
    );

    Ok(SyncSummary { report: outcome.report, inserted, aliases_recorded, final_count })
}

/// Append new spellings to the `source_id` of abstracts already stored.
/// Returns the number of documents updated.
async fn record_aliases(
    store: &dyn VectorStore,
    collection: &Collection,
    stored: &[Document],
    aliases: &[StoredAlias],
) -> Result<usize> {
    let mut by_pmid: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for alias in aliases {
        by_pmid.entry(alias.pubmed_id.as_str()).or_default().push(alias.source_id.as_str());
    }

    let mut updated = 0;
    for (pmid, spellings) in by_pmid {
        let Some(doc) = stored.iter().find(|d| d.field(PUBLICATION_FIELD) == Some(pmid)) else {
            warn!(pmid, "No stored abstract to attach spellings to");
            continue;
        };
        let mut ids: Vec<&str> = doc.field("source_id").map(|raw| split_source_ids(raw).collect()).unwrap_or_default();
        for spelling in spellings {
            if !ids.contains(&spelling) {
                ids.push(spelling);
            }
        }

        let mut metadata = doc.metadata().clone();
        metadata.insert("source_id".into(), MetadataValue::from(ids.join(SOURCE_ID_SEPARATOR)));
        store.update_metadata(collection, doc.id(), &metadata).await?;
        debug!(id = %doc.id(), source_id = %ids.join(SOURCE_ID_SEPARATOR), "Recorded spellings");
        updated += 1;
    }
    Ok(updated)
}
