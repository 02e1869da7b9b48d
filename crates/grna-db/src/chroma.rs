//! ChromaDB HTTP store (REST API v1).
//!
//! Endpoints used:
//!   GET    /api/v1/heartbeat
//!   GET    /api/v1/collections/{name}
//!   POST   /api/v1/collections                 (get_or_create)
//!   DELETE /api/v1/collections/{name}
//!   POST   /api/v1/collections/{id}/add|get|query|update
//!   GET    /api/v1/collections/{id}/count

use std::sync::Arc;

use async_trait::async_trait;
use grna_common::sandbox::SandboxClient as Client;
use grna_common::{Document, Metadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::embedding::Embedder;
use crate::error::{DbError, Result};
use crate::store::{validate_payload, Collection, Ensured, MetadataFilter, QueryHit, VectorStore};

type JsonMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromaConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-call `add` limit enforced client-side.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Page size used by `get_all`.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_batch_size() -> usize { 5461 }
fn default_page_size() -> usize { 1000 }

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_batch_size: default_max_batch_size(),
            page_size: default_page_size(),
        }
    }
}

impl ChromaConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
struct CollectionModel {
    id: String,
    name: String,
    #[serde(default)]
    metadata: Option<JsonMap>,
}

impl From<CollectionModel> for Collection {
    fn from(m: CollectionModel) -> Self {
        let description = m
            .metadata
            .as_ref()
            .and_then(|md| md.get("description"))
            .and_then(|d| d.as_str())
            .map(String::from);
        Collection { id: m.id, name: m.name, description }
    }
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<JsonMap>>>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<JsonMap>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

pub struct ChromaStore {
    cfg: ChromaConfig,
    base_url: String,
    client: Client,
    embedder: Option<Arc<dyn Embedder>>,
}

impl ChromaStore {
    /// Build a store for `cfg`. With `embedder = None` the server is expected
    /// to embed documents and query texts itself.
    pub fn new(cfg: ChromaConfig, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        let base_url = cfg.base_url();
        let mut client = Client::new()?;
        client.allow_url_host(&base_url)?;
        Ok(Self { cfg, base_url, client, embedder })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Fails with `DbError::Connection` when the server does not answer.
    #[instrument(skip(self))]
    pub async fn heartbeat(&self) -> Result<()> {
        let resp = self.client.get(&self.url("/heartbeat"))?.send().await?;
        if !resp.status().is_success() {
            return Err(DbError::Connection {
                endpoint: self.base_url.clone(),
                message: format!("heartbeat returned {}", resp.status()),
            });
        }
        Ok(())
    }

    async fn embed(&self, texts: &[String]) -> Result<Option<Vec<Vec<f32>>>> {
        match self.embedder {
            Some(ref e) => Ok(Some(e.embed(texts).await?)),
            None => Ok(None),
        }
    }

    async fn post_get(&self, collection: &Collection, body: serde_json::Value) -> Result<GetResponse> {
        let url = self.url(&format!("/collections/{}/get", collection.id));
        let resp = self.client.post(&url)?.json(&body).send().await?;
        let json = read_json(resp).await?;
        Ok(serde_json::from_value(json)?)
    }

    /// Ids from `ids` that already exist in the collection.
    async fn existing_ids(&self, collection: &Collection, ids: &[String]) -> Result<Vec<String>> {
        let body = serde_json::json!({ "ids": ids, "include": [] });
        Ok(self.post_get(collection, body).await?.ids)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    #[instrument(skip(self, description))]
    async fn ensure(&self, name: &str, description: &str) -> Result<Ensured> {
        match self.get_collection(name).await {
            Ok(collection) => {
                info!(collection = name, "Using existing collection");
                return Ok(Ensured { collection, was_created: false });
            }
            Err(DbError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let body = serde_json::json!({
            "name": name,
            "metadata": { "description": description, "hnsw:space": "cosine" },
            "get_or_create": true,
        });
        let resp = self.client.post(&self.url("/collections"))?.json(&body).send().await?;
        let model: CollectionModel = serde_json::from_value(read_json(resp).await?)?;
        info!(collection = name, id = %model.id, "Created new collection");
        Ok(Ensured { collection: model.into(), was_created: true })
    }

    async fn get_collection(&self, name: &str) -> Result<Collection> {
        let resp = self.client.get(&self.url(&format!("/collections/{}", name)))?.send().await?;
        match read_json(resp).await {
            Ok(json) => Ok(serde_json::from_value::<CollectionModel>(json)?.into()),
            Err(e) if is_missing(&e) => Err(DbError::NotFound(name.to_string())),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn drop_collection(&self, name: &str) -> Result<bool> {
        let resp = self.client.delete(&self.url(&format!("/collections/{}", name)))?.send().await?;
        match read_json(resp).await {
            Ok(_) => {
                info!(collection = name, "Dropped collection");
                Ok(true)
            }
            Err(e) if is_missing(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, collection, documents), fields(collection = %collection.name, n = documents.len()))]
    async fn add(&self, collection: &Collection, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        validate_payload(collection, documents, Some(self.cfg.max_batch_size))?;

        let ids: Vec<String> = documents.iter().map(|d| d.id().to_string()).collect();
        if let Some(id) = self.existing_ids(collection, &ids).await?.into_iter().next() {
            return Err(DbError::DuplicateId { collection: collection.name.clone(), id });
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text().to_string()).collect();
        let metadatas: Vec<serde_json::Value> =
            documents.iter().map(|d| metadata_json(d.metadata())).collect();

        let mut body = serde_json::json!({
            "ids": ids,
            "documents": texts,
            "metadatas": metadatas,
        });
        if let Some(vectors) = self.embed(&texts).await? {
            body["embeddings"] = serde_json::to_value(vectors)?;
        }

        let url = self.url(&format!("/collections/{}/add", collection.id));
        let resp = self.client.post(&url)?.json(&body).send().await?;
        match read_json(resp).await {
            Ok(_) => {
                debug!(n = documents.len(), "Documents added");
                Ok(())
            }
            Err(DbError::Api { status: 413, .. }) => Err(DbError::PayloadTooLarge {
                collection: collection.name.clone(),
                size: documents.len(),
                limit: self.cfg.max_batch_size,
            }),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, collection), fields(collection = %collection.name))]
    async fn get_all(&self, collection: &Collection) -> Result<Vec<Document>> {
        let page = self.cfg.page_size.max(1);
        let mut out = Vec::new();
        let mut offset = 0usize;
        loop {
            let body = serde_json::json!({
                "limit": page,
                "offset": offset,
                "include": ["documents", "metadatas"],
            });
            let resp = self.post_get(collection, body).await?;
            let n = resp.ids.len();
            out.extend(documents_from_get(&collection.name, resp)?);
            if n < page {
                break;
            }
            offset += n;
        }
        debug!(n = out.len(), "Loaded all documents");
        Ok(out)
    }

    #[instrument(skip(self, collection, filter), fields(collection = %collection.name))]
    async fn query(
        &self,
        collection: &Collection,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        if k == 0 {
            return Ok(vec![]);
        }
        let where_clause = filter.and_then(MetadataFilter::to_where);

        if text.trim().is_empty() {
            let mut body = serde_json::json!({
                "limit": k,
                "include": ["documents", "metadatas"],
            });
            if let Some(w) = where_clause {
                body["where"] = w;
            }
            let resp = self.post_get(collection, body).await?;
            return Ok(documents_from_get(&collection.name, resp)?
                .into_iter()
                .map(|document| QueryHit { document, distance: None })
                .collect());
        }

        let mut body = serde_json::json!({
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });
        let texts = vec![text.to_string()];
        match self.embed(&texts).await? {
            Some(vectors) => body["query_embeddings"] = serde_json::to_value(vectors)?,
            None => body["query_texts"] = serde_json::to_value(&texts)?,
        }
        if let Some(w) = where_clause {
            body["where"] = w;
        }

        let url = self.url(&format!("/collections/{}/query", collection.id));
        let resp = self.client.post(&url)?.json(&body).send().await?;
        let parsed: QueryResponse = serde_json::from_value(read_json(resp).await?)?;
        let mut hits = hits_from_query(&collection.name, parsed)?;
        hits.sort_by(|a, b| {
            a.distance
                .unwrap_or(f32::MAX)
                .total_cmp(&b.distance.unwrap_or(f32::MAX))
        });
        Ok(hits)
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let url = self.url(&format!("/collections/{}/count", collection.id));
        let resp = self.client.get(&url)?.send().await?;
        let json = read_json(resp).await?;
        json.as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| DbError::InvalidResponse(format!("count was not a number: {json}")))
    }

    #[instrument(skip(self, collection, metadata), fields(collection = %collection.name))]
    async fn update_metadata(&self, collection: &Collection, id: &str, metadata: &Metadata) -> Result<()> {
        let ids = vec![id.to_string()];
        // Chroma ignores unknown ids on update, so check first.
        if self.existing_ids(collection, &ids).await?.is_empty() {
            return Err(DbError::MissingDocument {
                collection: collection.name.clone(),
                id: id.to_string(),
            });
        }
        let body = serde_json::json!({ "ids": ids, "metadatas": [metadata_json(metadata)] });
        let url = self.url(&format!("/collections/{}/update", collection.id));
        let resp = self.client.post(&url)?.json(&body).send().await?;
        read_json(resp).await?;
        debug!(id, "Metadata updated");
        Ok(())
    }

    fn max_batch_size(&self) -> Option<usize> {
        Some(self.cfg.max_batch_size)
    }
}

// ── Response helpers ──────────────────────────────────────────────────────────

async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value> {
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    let json: serde_json::Value = if body.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body))
    };
    if status >= 400 {
        let message = json["message"]
            .as_str()
            .or_else(|| json["error"].as_str())
            .or_else(|| json["detail"].as_str())
            .or_else(|| json.as_str())
            .unwrap_or("unknown store error")
            .to_string();
        return Err(DbError::Api { status, message });
    }
    Ok(json)
}

/// Chroma versions disagree on how a missing collection is reported.
fn is_missing(err: &DbError) -> bool {
    match err {
        DbError::Api { status: 404, .. } => true,
        DbError::Api { message, .. } => message.contains("does not exist"),
        _ => false,
    }
}

/// Chroma rejects empty metadata objects; send null instead.
fn metadata_json(metadata: &Metadata) -> serde_json::Value {
    if metadata.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::Value::Object(metadata.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// `None` for records stored without text; they cannot be represented as a
/// [`Document`] and are skipped rather than failing the whole read.
fn to_document(
    collection: &str,
    id: String,
    text: Option<String>,
    metadata: Option<JsonMap>,
) -> Result<Option<Document>> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        warn!(collection, id = %id, "Skipping stored document with no text");
        return Ok(None);
    };
    let metadata: JsonMap = metadata
        .unwrap_or_default()
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .collect();
    Ok(Some(Document::from_json_metadata(id, text, &metadata)?))
}

fn documents_from_get(collection: &str, resp: GetResponse) -> Result<Vec<Document>> {
    let mut documents = resp.documents.unwrap_or_default().into_iter();
    let mut metadatas = resp.metadatas.unwrap_or_default().into_iter();
    let mut out = Vec::with_capacity(resp.ids.len());
    for id in resp.ids {
        if let Some(doc) = to_document(collection, id, documents.next().flatten(), metadatas.next().flatten())? {
            out.push(doc);
        }
    }
    Ok(out)
}

fn hits_from_query(collection: &str, resp: QueryResponse) -> Result<Vec<QueryHit>> {
    let ids = resp.ids.into_iter().next().unwrap_or_default();
    let mut documents = resp.documents.and_then(|d| d.into_iter().next()).unwrap_or_default().into_iter();
    let mut metadatas = resp.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default().into_iter();
    let mut distances = resp.distances.and_then(|d| d.into_iter().next()).unwrap_or_default().into_iter();
    let mut hits = Vec::with_capacity(ids.len());
    for id in ids {
        let distance = distances.next().flatten();
        if let Some(document) = to_document(collection, id, documents.next().flatten(), metadatas.next().flatten())? {
            hits.push(QueryHit { document, distance });
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_from_query_unwraps_first_row() {
        let resp: QueryResponse = serde_json::from_value(serde_json::json!({
            "ids": [["entry_1", "entry_0"]],
            "documents": [["Target: EGFP", "Target: AAVS1"]],
            "metadatas": [[{"target": "EGFP", "row_index": 1}, {"target": "AAVS1", "row_index": 0, "note": null}]],
            "distances": [[0.12, 0.4]],
        }))
        .unwrap();
        let hits = hits_from_query("c", resp).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.id(), "entry_1");
        assert_eq!(hits[0].distance, Some(0.12));
        assert_eq!(hits[1].document.field("target"), Some("AAVS1"));
        assert!(!hits[1].document.metadata().contains_key("note"));
    }

    #[test]
    fn test_records_without_text_are_skipped() {
        let resp: GetResponse = serde_json::from_value(serde_json::json!({
            "ids": ["pubmed_1", "pubmed_2", "pubmed_3"],
            "documents": [null, "Second abstract.", "  "],
            "metadatas": [{"pubmed_id": "1"}, {"pubmed_id": "2"}, null],
        }))
        .unwrap();
        let docs = documents_from_get("pubmed_abstracts", resp).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id(), "pubmed_2");
    }

    #[test]
    fn test_missing_collection_detection() {
        assert!(is_missing(&DbError::Api { status: 404, message: String::new() }));
        assert!(is_missing(&DbError::Api {
            status: 500,
            message: "Collection grna_addgene does not exist.".to_string()
        }));
        assert!(!is_missing(&DbError::Api { status: 500, message: "boom".to_string() }));
    }
}
