//! Cross-reference sync: bring the abstract corpus up to date with the
//! publications the plasmid corpus references.
//!
//! Plan (pure):  primary docs + known ids → ordered work list
//! Execute:      resolve PMC ids, claim the PubMed id, fetch the abstract
//! Settle:       attach every other spelling that resolved to a claimed id
//!
//! Every spelling that resolves ends up stored, either on the record fetched
//! in this run or as an alias of an abstract already in the store, so a
//! converged pair yields an empty work list and makes no external calls.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use grna_common::Document;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::dedup::{KnownPublications, PublicationId};
use crate::models::AbstractRecord;
use crate::sources::BibliographicSource;

/// Metadata key holding the publication reference on plasmid documents.
pub const PUBLICATION_FIELD: &str = "pubmed_id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFailure {
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub primary_records: usize,
    pub without_identifier: usize,
    /// References already covered by the abstract corpus.
    pub already_present: usize,
    /// References repeating an identifier queued earlier in this run.
    pub repeated_in_run: usize,
    /// Spellings that resolved to a publication fetched in this run.
    pub aliased_in_run: usize,
    /// Spellings that resolved to an abstract already in the store.
    pub resolved_to_known: usize,
    pub fetched: usize,
    pub failures: Vec<SyncFailure>,
}

/// Ordered, de-duplicated list of identifiers to resolve and fetch.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub work: Vec<PublicationId>,
    pub report: SyncReport,
}

/// A new spelling for an abstract that is already stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAlias {
    pub pubmed_id: String,
    pub source_id: String,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// New abstracts, in primary-corpus order of first reference. Each
    /// carries every spelling that resolved to it.
    pub records: Vec<AbstractRecord>,
    /// Spellings to add to abstracts stored by earlier runs.
    pub aliases: Vec<StoredAlias>,
    pub report: SyncReport,
}

enum ItemResult {
    Fetched(AbstractRecord),
    /// Resolved to a PubMed id that another reference had claimed.
    Claimed { pmid: String },
    Failed(SyncFailure),
}

pub struct CrossRefSync<S: BibliographicSource + ?Sized> {
    source: Arc<S>,
    concurrency: usize,
}

impl<S: BibliographicSource + ?Sized> CrossRefSync<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source, concurrency: 1 }
    }

    /// Number of identifiers resolved/fetched at once. Zero is treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Plan against `secondary` and fetch everything missing.
    #[instrument(skip_all, fields(primary = primary.len(), secondary = secondary.len()))]
    pub async fn run(&self, primary: &[Document], secondary: &[Document]) -> SyncOutcome {
        let known = KnownPublications::from_documents(secondary);
        let SyncPlan { work, mut report } = plan(primary, &known);
        info!(
            run_id = %report.run_id,
            to_fetch = work.len(),
            already_present = report.already_present,
            "Sync plan ready"
        );
        if work.is_empty() {
            return SyncOutcome { records: vec![], aliases: vec![], report };
        }

        let seen = Arc::new(Mutex::new(known.clone()));
        let mut results: Vec<(usize, PublicationId, ItemResult)> = stream::iter(work.into_iter().enumerate())
            .map(|(i, id)| {
                let source = Arc::clone(&self.source);
                let seen = Arc::clone(&seen);
                async move {
                    let result = sync_one(source.as_ref(), &seen, &id).await;
                    (i, id, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(i, _, _)| *i);

        let mut records = Vec::new();
        let mut claimed = Vec::new();
        let mut failures = Vec::new();
        for (i, id, result) in results {
            match result {
                ItemResult::Fetched(rec) => records.push(rec),
                ItemResult::Claimed { pmid } => claimed.push((i, id, pmid)),
                ItemResult::Failed(f) => failures.push((i, f)),
            }
        }

        // Settled after every fetch has finished, so the outcome does not
        // depend on how workers interleaved.
        let mut aliases = Vec::new();
        for (i, id, pmid) in claimed {
            if let Some(rec) = records.iter_mut().find(|r| r.pubmed_id == pmid) {
                rec.add_source_id(id.key());
                report.aliased_in_run += 1;
            } else if known.contains(&pmid) {
                aliases.push(StoredAlias { pubmed_id: pmid, source_id: id.key().to_string() });
                report.resolved_to_known += 1;
            } else {
                let reason = format!("resolved to PubMed {pmid}, which could not be fetched");
                warn!(identifier = %id, %reason, "Skipping publication");
                failures.push((i, SyncFailure { identifier: id.key().to_string(), reason }));
            }
        }
        failures.sort_by_key(|(i, _)| *i);
        report.failures = failures.into_iter().map(|(_, f)| f).collect();

        report.fetched = records.len();
        info!(
            run_id = %report.run_id,
            fetched = report.fetched,
            aliased = report.aliased_in_run,
            failed = report.failures.len(),
            "Sync fetch complete"
        );
        SyncOutcome { records, aliases, report }
    }
}

/// Work out which references need fetching. No I/O.
pub fn plan(primary: &[Document], known: &KnownPublications) -> SyncPlan {
    let mut report = SyncReport {
        run_id: Uuid::new_v4(),
        primary_records: primary.len(),
        ..Default::default()
    };
    let mut queued = HashSet::new();
    let mut work = Vec::new();

    for doc in primary {
        let Some(id) = doc.field(PUBLICATION_FIELD).and_then(PublicationId::parse) else {
            report.without_identifier += 1;
            continue;
        };
        if known.contains(id.key()) {
            report.already_present += 1;
        } else if !queued.insert(id.key().to_string()) {
            report.repeated_in_run += 1;
        } else {
            work.push(id);
        }
    }
    SyncPlan { work, report }
}

async fn sync_one<S: BibliographicSource + ?Sized>(
    source: &S,
    seen: &Mutex<KnownPublications>,
    id: &PublicationId,
) -> ItemResult {
    let fail = |reason: String| {
        warn!(identifier = %id, %reason, "Skipping publication");
        ItemResult::Failed(SyncFailure { identifier: id.key().to_string(), reason })
    };

    let pmid = match id {
        PublicationId::PubMed(pmid) => pmid.clone(),
        PublicationId::PubMedCentral(pmcid) => match source.resolve_pmcid(pmcid).await {
            Ok(Some(pmid)) => pmid,
            Ok(None) => return fail("no PubMed id linked to this PMC id".to_string()),
            Err(e) => return fail(e.to_string()),
        },
    };

    // Check-and-claim under one lock so two workers never fetch the same id.
    if !seen.lock().await.insert(pmid.clone()) {
        debug!(identifier = %id, pmid = %pmid, "Already claimed");
        return ItemResult::Claimed { pmid };
    }

    match source.fetch_abstract(&pmid).await {
        Ok(abstract_text) => ItemResult::Fetched(AbstractRecord::new(pmid, id.key(), abstract_text)),
        Err(e) => {
            seen.lock().await.remove(&pmid);
            fail(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grna_common::{Metadata, MetadataValue};

    fn plasmid(row: usize, pubmed: &str) -> Document {
        let mut meta = Metadata::new();
        meta.insert(PUBLICATION_FIELD.into(), MetadataValue::from(pubmed));
        Document::new(format!("entry_{row}"), "Target: X", meta).unwrap()
    }

    #[test]
    fn test_plan_skips_known_blank_and_repeated() {
        let primary = vec![
            plasmid(0, "111"),
            plasmid(1, ""),
            plasmid(2, "222"),
            plasmid(3, "111"),
            plasmid(4, "pmc5"),
            plasmid(5, "PMC5"),
        ];
        let mut known = KnownPublications::default();
        known.insert("222");

        let planned = plan(&primary, &known);
        let keys: Vec<&str> = planned.work.iter().map(|id| id.key()).collect();
        assert_eq!(keys, vec!["111", "PMC5"]);
        assert_eq!(planned.report.without_identifier, 1);
        assert_eq!(planned.report.already_present, 1);
        assert_eq!(planned.report.repeated_in_run, 2);
    }

    struct NeverSource;

    #[async_trait::async_trait]
    impl BibliographicSource for NeverSource {
        async fn resolve_pmcid(&self, _: &str) -> Result<Option<String>, crate::SourceError> {
            unreachable!()
        }
        async fn fetch_abstract(&self, _: &str) -> Result<String, crate::SourceError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_converged_run_makes_no_calls() {
        let primary = vec![plasmid(0, "111")];
        let mut meta = Metadata::new();
        meta.insert("pubmed_id".into(), MetadataValue::from("111"));
        let secondary = vec![Document::new("pubmed_111", "abstract", meta).unwrap()];

        let outcome = CrossRefSync::new(Arc::new(NeverSource)).run(&primary, &secondary).await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.report.already_present, 1);
    }
}
