//! `grna sync`: fetch abstracts for referenced publications.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use grna_db::VectorStore;
use grna_ingestion::sources::pubmed::PubMedClient;
use grna_ingestion::{run_sync, SyncSettings};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::config::Config;

pub async fn run(store: &dyn VectorStore, config: &Config) -> anyhow::Result<()> {
    let client = PubMedClient::with_options(
        &config.pubmed.base_url,
        config.pubmed.api_key.as_ref().map(|k| k.expose_secret().to_string()),
        Duration::from_secs(config.pubmed.timeout_secs),
    )?;

    let settings = SyncSettings {
        primary_collection: config.ingestion.plasmid_collection.clone(),
        secondary_collection: config.ingestion.abstract_collection.clone(),
        secondary_description: config.ingestion.abstract_description.clone(),
        batch_size: config.ingestion.batch_size,
        concurrency: config.pubmed.concurrency,
    };

    let summary = run_sync(store, Arc::new(client), &settings)
        .await
        .with_context(|| format!("syncing '{}'", settings.secondary_collection))?;

    let r = &summary.report;
    info!(
        run_id = %r.run_id,
        primary = r.primary_records,
        without_identifier = r.without_identifier,
        already_present = r.already_present,
        repeated = r.repeated_in_run,
        aliased = r.aliased_in_run,
        resolved_to_known = r.resolved_to_known,
        aliases_recorded = summary.aliases_recorded,
        fetched = r.fetched,
        failed = r.failures.len(),
        final_count = summary.final_count,
        "Sync report"
    );
    for failure in &r.failures {
        warn!(identifier = %failure.identifier, reason = %failure.reason, "Not fetched");
    }
    Ok(())
}
