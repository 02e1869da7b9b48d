//! Similarity and metadata search over one collection.

use std::sync::Arc;

use grna_common::Metadata;
use grna_db::{Collection, CollectionInfo, MetadataFilter, QueryHit, VectorStore};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::Result;

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_FILTER_K: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// `None` for metadata-only searches.
    pub distance: Option<f32>,
}

impl SearchResult {
    /// Display similarity, `1 - distance`.
    pub fn similarity(&self) -> Option<f32> {
        self.distance.map(|d| 1.0 - d)
    }

    /// Metadata field rendered as text, `"N/A"` when absent.
    pub fn field_or_na(&self, key: &str) -> String {
        self.metadata
            .get(key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

impl From<QueryHit> for SearchResult {
    fn from(hit: QueryHit) -> Self {
        let (id, document, metadata) = hit.document.into_parts();
        Self { id, document, metadata, distance: hit.distance }
    }
}

pub struct QueryInterface {
    store: Arc<dyn VectorStore>,
    collection: Collection,
}

impl QueryInterface {
    /// Attach to an existing collection.
    ///
    /// # Errors
    /// `DbError::NotFound` if the collection has not been ingested.
    pub async fn connect(store: Arc<dyn VectorStore>, name: &str) -> Result<Self> {
        let collection = store.get_collection(name).await?;
        info!(collection = name, "Connected to collection");
        Ok(Self { store, collection })
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Top-`k` nearest documents, ascending distance.
    #[instrument(skip(self))]
    pub async fn search(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let hits = self.store.query(&self.collection, text, k, None).await?;
        let mut results: Vec<SearchResult> = hits.into_iter().map(SearchResult::from).collect();
        // Stable, so equal distances keep store order.
        results.sort_by(|a, b| {
            a.distance
                .unwrap_or(f32::MAX)
                .total_cmp(&b.distance.unwrap_or(f32::MAX))
        });
        results.truncate(k);
        debug!(n = results.len(), "Similarity search done");
        Ok(results)
    }

    /// Up to `k` documents matching every filter key exactly. Unranked.
    #[instrument(skip(self, filter), fields(filter = %filter))]
    pub async fn search_by_metadata(&self, filter: &MetadataFilter, k: usize) -> Result<Vec<SearchResult>> {
        let hits = self.store.query(&self.collection, "", k, Some(filter)).await?;
        Ok(hits
            .into_iter()
            .map(|h| SearchResult { distance: None, ..SearchResult::from(h) })
            .collect())
    }

    pub async fn info(&self) -> Result<CollectionInfo> {
        Ok(self.store.info(&self.collection).await?)
    }
}
