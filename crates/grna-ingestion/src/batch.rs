//! Size-bounded, sequential insertion.

use grna_common::Document;
use grna_db::{Collection, DbError, VectorStore};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, instrument};

pub const DEFAULT_BATCH_SIZE: usize = 2000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub batches: usize,
    pub documents: usize,
}

/// A chunk failed; everything before it stays committed.
#[derive(Debug, Error)]
#[error(
    "batch {batch}/{total_batches} for collection '{collection}' failed after \
     {} batches ({} documents) were committed: {source}",
    .committed.batches, .committed.documents
)]
pub struct BatchError {
    pub collection: String,
    /// 1-based index of the failing chunk.
    pub batch: usize,
    pub total_batches: usize,
    pub committed: BatchReport,
    #[source]
    pub source: DbError,
}

/// Insert `documents` in contiguous chunks of at most `batch_size`, one
/// `add` per chunk, in order. Stops at the first failing chunk.
#[instrument(skip(store, collection, documents), fields(collection = %collection.name, n = documents.len()))]
pub async fn insert_in_batches(
    store: &dyn VectorStore,
    collection: &Collection,
    documents: &[Document],
    batch_size: usize,
) -> Result<BatchReport, BatchError> {
    let batch_size = batch_size.max(1);
    let total_batches = documents.len().div_ceil(batch_size);
    let mut committed = BatchReport::default();

    for (i, chunk) in documents.chunks(batch_size).enumerate() {
        if let Err(source) = store.add(collection, chunk).await {
            error!(batch = i + 1, total_batches, error = %source, "Batch insert failed");
            return Err(BatchError {
                collection: collection.name.clone(),
                batch: i + 1,
                total_batches,
                committed,
                source,
            });
        }
        committed.batches += 1;
        committed.documents += chunk.len();
        debug!(batch = i + 1, total_batches, size = chunk.len(), "Batch inserted");
    }
    Ok(committed)
}
