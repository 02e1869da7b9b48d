//! In-process store.
//!
//! Implements the full [`VectorStore`] contract without a server: documents
//! are kept in insertion order and similarity is the cosine distance between
//! lowercase token-frequency vectors. Used by tests and offline demos.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use grna_common::{Document, Metadata};
use tokio::sync::Mutex;

use crate::error::{DbError, Result};
use crate::store::{validate_payload, Collection, Ensured, MetadataFilter, QueryHit, VectorStore};

#[derive(Debug, Default)]
struct MemCollection {
    description: Option<String>,
    documents: Vec<Document>,
    ids: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, MemCollection>>,
    max_batch_size: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Enforce a per-call `add` limit, like a real server would.
    pub fn with_max_batch_size(mut self, limit: usize) -> Self {
        self.max_batch_size = Some(limit);
        self
    }

    fn handle(name: &str, coll: &MemCollection) -> Collection {
        Collection {
            id: name.to_string(),
            name: name.to_string(),
            description: coll.description.clone(),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure(&self, name: &str, description: &str) -> Result<Ensured> {
        let mut collections = self.collections.lock().await;
        let was_created = !collections.contains_key(name);
        let coll = collections.entry(name.to_string()).or_insert_with(|| MemCollection {
            description: Some(description.to_string()),
            ..Default::default()
        });
        Ok(Ensured { collection: Self::handle(name, coll), was_created })
    }

    async fn get_collection(&self, name: &str) -> Result<Collection> {
        let collections = self.collections.lock().await;
        collections
            .get(name)
            .map(|c| Self::handle(name, c))
            .ok_or_else(|| DbError::NotFound(name.to_string()))
    }

    async fn drop_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections.lock().await.remove(name).is_some())
    }

    async fn add(&self, collection: &Collection, documents: &[Document]) -> Result<()> {
        validate_payload(collection, documents, self.max_batch_size)?;
        let mut collections = self.collections.lock().await;
        let coll = collections
            .get_mut(&collection.name)
            .ok_or_else(|| DbError::NotFound(collection.name.clone()))?;
        if let Some(dup) = documents.iter().find(|d| coll.ids.contains(d.id())) {
            return Err(DbError::DuplicateId {
                collection: collection.name.clone(),
                id: dup.id().to_string(),
            });
        }
        for doc in documents {
            coll.ids.insert(doc.id().to_string());
            coll.documents.push(doc.clone());
        }
        Ok(())
    }

    async fn get_all(&self, collection: &Collection) -> Result<Vec<Document>> {
        let collections = self.collections.lock().await;
        collections
            .get(&collection.name)
            .map(|c| c.documents.clone())
            .ok_or_else(|| DbError::NotFound(collection.name.clone()))
    }

    async fn query(
        &self,
        collection: &Collection,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        let collections = self.collections.lock().await;
        let coll = collections
            .get(&collection.name)
            .ok_or_else(|| DbError::NotFound(collection.name.clone()))?;

        let candidates = coll
            .documents
            .iter()
            .filter(|d| filter.map_or(true, |f| f.matches(d.metadata())));

        if text.trim().is_empty() {
            return Ok(candidates
                .take(k)
                .map(|d| QueryHit { document: d.clone(), distance: None })
                .collect());
        }

        let query_vec = term_frequencies(text);
        let mut hits: Vec<QueryHit> = candidates
            .map(|d| QueryHit {
                document: d.clone(),
                distance: Some(cosine_distance(&query_vec, &term_frequencies(d.text()))),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .unwrap_or(f32::MAX)
                .total_cmp(&b.distance.unwrap_or(f32::MAX))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let collections = self.collections.lock().await;
        collections
            .get(&collection.name)
            .map(|c| c.documents.len())
            .ok_or_else(|| DbError::NotFound(collection.name.clone()))
    }

    async fn update_metadata(&self, collection: &Collection, id: &str, metadata: &Metadata) -> Result<()> {
        let mut collections = self.collections.lock().await;
        let coll = collections
            .get_mut(&collection.name)
            .ok_or_else(|| DbError::NotFound(collection.name.clone()))?;
        let doc = coll.documents.iter_mut().find(|d| d.id() == id).ok_or_else(|| {
            DbError::MissingDocument { collection: collection.name.clone(), id: id.to_string() }
        })?;
        *doc = Document::new(doc.id(), doc.text(), metadata.clone())?;
        Ok(())
    }

    fn max_batch_size(&self) -> Option<usize> {
        self.max_batch_size
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f32> {
    let mut tf = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *tf.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    tf
}

/// `1 - cosine similarity`, in `[0, 1]` for non-negative vectors.
fn cosine_distance(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    let dot: f32 = a.iter().filter_map(|(t, x)| b.get(t).map(|y| x * y)).sum();
    let norm_a = a.values().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}
