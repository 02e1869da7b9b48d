//! grna-test-utils: test doubles and fixtures shared by the grna crates'
//! integration tests.
//!
//! - [`CountingSource`]: scripted bibliographic service that counts calls
//! - [`RecordingStore`]: [`MemoryStore`] wrapper that records `add` sizes
//! - [`RecordingLlm`]: canned LLM backend that keeps every request
//! - fixtures for the Addgene TSV snapshot

pub mod fixtures;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use grna_common::{Document, Metadata};
use grna_db::{Collection, Ensured, MemoryStore, MetadataFilter, QueryHit, VectorStore};
use grna_ingestion::{BibliographicSource, SourceError};
use grna_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse};

// ── Bibliographic source ──────────────────────────────────────────────────────

/// Scripted E-utilities stand-in.
#[derive(Debug, Default)]
pub struct CountingSource {
    links: HashMap<String, String>,
    abstracts: HashMap<String, String>,
    failing: Vec<String>,
    resolve_calls: Mutex<Vec<String>>,
    fetch_calls: Mutex<Vec<String>>,
}

impl CountingSource {
    pub fn new() -> Self { Self::default() }

    /// `pmcid` resolves to `pmid`.
    pub fn link(mut self, pmcid: &str, pmid: &str) -> Self {
        self.links.insert(pmcid.to_string(), pmid.to_string());
        self
    }

    pub fn with_abstract(mut self, pmid: &str, text: &str) -> Self {
        self.abstracts.insert(pmid.to_string(), text.to_string());
        self
    }

    /// Every call for `id` fails with a timeout.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.push(id.to_string());
        self
    }

    pub fn resolve_calls(&self) -> Vec<String> {
        self.resolve_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.resolve_calls().len() + self.fetch_calls().len()
    }

    fn check_failing(&self, id: &str) -> Result<(), SourceError> {
        if self.failing.iter().any(|f| f == id) {
            return Err(SourceError::Timeout { id: id.to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl BibliographicSource for CountingSource {
    async fn resolve_pmcid(&self, pmcid: &str) -> Result<Option<String>, SourceError> {
        if let Ok(mut calls) = self.resolve_calls.lock() {
            calls.push(pmcid.to_string());
        }
        self.check_failing(pmcid)?;
        Ok(self.links.get(pmcid).cloned())
    }

    async fn fetch_abstract(&self, pmid: &str) -> Result<String, SourceError> {
        if let Ok(mut calls) = self.fetch_calls.lock() {
            calls.push(pmid.to_string());
        }
        // Yield so concurrent workers interleave.
        tokio::task::yield_now().await;
        self.check_failing(pmid)?;
        Ok(self.abstracts.get(pmid).cloned().unwrap_or_default())
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Delegates to a [`MemoryStore`] and records the size of every `add`.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    adds: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner, adds: Mutex::new(Vec::new()) }
    }

    /// Document counts of each `add` call, in order.
    pub fn add_sizes(&self) -> Vec<usize> {
        self.adds.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn ensure(&self, name: &str, description: &str) -> grna_db::Result<Ensured> {
        self.inner.ensure(name, description).await
    }

    async fn get_collection(&self, name: &str) -> grna_db::Result<Collection> {
        self.inner.get_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> grna_db::Result<bool> {
        self.inner.drop_collection(name).await
    }

    async fn add(&self, collection: &Collection, documents: &[Document]) -> grna_db::Result<()> {
        if let Ok(mut adds) = self.adds.lock() {
            adds.push(documents.len());
        }
        self.inner.add(collection, documents).await
    }

    async fn get_all(&self, collection: &Collection) -> grna_db::Result<Vec<Document>> {
        self.inner.get_all(collection).await
    }

    async fn query(
        &self,
        collection: &Collection,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> grna_db::Result<Vec<QueryHit>> {
        self.inner.query(collection, text, k, filter).await
    }

    async fn update_metadata(
        &self,
        collection: &Collection,
        id: &str,
        metadata: &Metadata,
    ) -> grna_db::Result<()> {
        self.inner.update_metadata(collection, id, metadata).await
    }

    async fn count(&self, collection: &Collection) -> grna_db::Result<usize> {
        self.inner.count(collection).await
    }

    fn max_batch_size(&self) -> Option<usize> {
        self.inner.max_batch_size()
    }
}

// ── LLM ───────────────────────────────────────────────────────────────────────

/// Answers every request with a fixed reply and keeps the requests.
#[derive(Debug)]
pub struct RecordingLlm {
    reply: String,
    requests: Mutex<Vec<LlmRequest>>,
}

impl RecordingLlm {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), requests: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmBackend for RecordingLlm {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req);
        }
        Ok(LlmResponse {
            content: self.reply.clone(),
            model: "recording".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    fn model_id(&self) -> &str { "recording" }
    fn is_local(&self) -> bool { true }
}
