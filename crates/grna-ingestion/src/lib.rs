//! grna-ingestion: corpus ingestion and cross-corpus sync.
//!
//! - Source loading (Addgene TSV snapshot, JSON record dumps)
//! - Record → Document transformation
//! - Publication cross-reference sync against PubMed E-utilities
//! - Size-bounded batch insertion

pub mod batch;
pub mod dedup;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod sync;
pub mod transform;

pub use batch::{insert_in_batches, BatchError, BatchReport, DEFAULT_BATCH_SIZE};
pub use error::{IngestionError, Result};
pub use models::{AbstractRecord, PlasmidRecord};
pub use pipeline::{ingest_documents, run_sync, IngestMode, IngestionReport, SyncSettings, SyncSummary};
pub use sources::{BibliographicSource, SourceError};
pub use sync::{CrossRefSync, StoredAlias, SyncFailure, SyncOutcome, SyncReport};
