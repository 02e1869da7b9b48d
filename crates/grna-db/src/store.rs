//! The store adapter contract.
//!
//! A [`VectorStore`] owns named collections of [`Document`]s. Both corpora
//! (plasmid records and publication abstracts) live behind this trait; the
//! pipeline never keeps its own copy between runs.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use grna_common::{Document, Metadata, MetadataValue};
use serde::Serialize;

use crate::error::{DbError, Result};

/// Handle to a named collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// Store-assigned identifier (equal to `name` for stores without one).
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Outcome of [`VectorStore::ensure`].
#[derive(Debug, Clone)]
pub struct Ensured {
    pub collection: Collection,
    /// True when this call created the collection.
    pub was_created: bool,
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub document: Document,
    /// Non-negative dissimilarity; `None` for filter-only scans.
    pub distance: Option<f32>,
}

/// Summary used by the query layer's `info` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub document_count: usize,
    pub description: Option<String>,
}

/// Metadata equality filter. Every key must match exactly (logical AND).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    clauses: BTreeMap<String, MetadataValue>,
}

impl MetadataFilter {
    pub fn new() -> Self { Self::default() }

    /// Add an equality clause.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.clauses.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool { self.clauses.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.clauses.iter()
    }

    /// True when every clause matches `metadata` exactly. A missing key
    /// never matches.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.clauses
            .iter()
            .all(|(k, v)| metadata.get(k).is_some_and(|actual| actual == v))
    }

    /// Render as a ChromaDB `where` clause. Multiple keys need an explicit
    /// `$and`.
    pub fn to_where(&self) -> Option<serde_json::Value> {
        let mut parts: Vec<serde_json::Value> = self
            .clauses
            .iter()
            .map(|(k, v)| {
                let mut obj = serde_json::Map::new();
                obj.insert(k.clone(), v.to_json());
                serde_json::Value::Object(obj)
            })
            .collect();
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(serde_json::json!({ "$and": parts })),
        }
    }
}

impl std::fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.clauses.iter().map(|(k, v)| format!("{k} = {v}")).collect();
        f.write_str(&parts.join(" AND "))
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return the named collection, creating it with `description` if absent.
    /// Safe to call repeatedly.
    async fn ensure(&self, name: &str, description: &str) -> Result<Ensured>;

    /// Return an existing collection without creating it.
    ///
    /// # Errors
    /// `DbError::NotFound` if the collection does not exist.
    async fn get_collection(&self, name: &str) -> Result<Collection>;

    /// Delete a collection. Returns false if it did not exist.
    async fn drop_collection(&self, name: &str) -> Result<bool>;

    /// Append documents.
    ///
    /// # Errors
    /// `DbError::DuplicateId` when any id repeats within the call or already
    /// exists; `DbError::PayloadTooLarge` when `documents` exceeds
    /// [`VectorStore::max_batch_size`].
    async fn add(&self, collection: &Collection, documents: &[Document]) -> Result<()>;

    /// Every document in the collection. Unbounded; reconciliation only.
    async fn get_all(&self, collection: &Collection) -> Result<Vec<Document>>;

    /// Nearest-neighbour search. An empty `text` is a filter-only scan
    /// whose hits carry no distance and whose order is store-defined.
    async fn query(
        &self,
        collection: &Collection,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>>;

    async fn count(&self, collection: &Collection) -> Result<usize>;

    /// Replace the metadata of one stored document; text is left as is.
    ///
    /// # Errors
    /// `DbError::MissingDocument` when `id` is not in the collection.
    async fn update_metadata(&self, collection: &Collection, id: &str, metadata: &Metadata) -> Result<()>;

    /// Per-call document limit for `add`, if the store has one.
    fn max_batch_size(&self) -> Option<usize>;

    async fn info(&self, collection: &Collection) -> Result<CollectionInfo> {
        Ok(CollectionInfo {
            name: collection.name.clone(),
            document_count: self.count(collection).await?,
            description: collection.description.clone(),
        })
    }
}

/// Reject an `add` payload that is too large or repeats an id.
pub(crate) fn validate_payload(
    collection: &Collection,
    documents: &[Document],
    limit: Option<usize>,
) -> Result<()> {
    if let Some(limit) = limit {
        if documents.len() > limit {
            return Err(DbError::PayloadTooLarge {
                collection: collection.name.clone(),
                size: documents.len(),
                limit,
            });
        }
    }
    let mut seen = HashSet::with_capacity(documents.len());
    for doc in documents {
        if !seen.insert(doc.id()) {
            return Err(DbError::DuplicateId {
                collection: collection.name.clone(),
                id: doc.id().to_string(),
            });
        }
    }
    Ok(())
}
