//! Client-side embedding backends.
//!
//! ChromaDB's HTTP API stores whatever vectors it is given; when the server
//! is not configured to embed on its own, [`crate::chroma::ChromaStore`]
//! calls an [`Embedder`] for both `add` and `query` so documents and queries
//! land in the same space.
//!
//! Backends:
//!   - Ollama         (`/api/embeddings`, one text per call)
//!   - OpenAI         (`text-embedding-3-small` by default)
//!   - OpenAI-compat  (any `/v1/embeddings` endpoint)

use async_trait::async_trait;
use grna_common::sandbox::SandboxClient as Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{DbError, Result};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn model_id(&self) -> &str;
}

// ── Backend config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    Ollama,
    OpenAi,
    OpenAiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend:    EmbeddingBackend,
    pub model:      String,
    #[serde(default)]
    pub base_url:   Option<String>,
    #[serde(default)]
    pub api_key:    Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize { 64 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend:    EmbeddingBackend::Ollama,
            model:      "nomic-embed-text".to_string(),
            base_url:   None,
            api_key:    None,
            batch_size: default_batch_size(),
        }
    }
}

// ── Embedding client ──────────────────────────────────────────────────────────

pub struct EmbeddingClient {
    cfg:    EmbeddingConfig,
    client: Client,
}

impl EmbeddingClient {
    pub fn new(cfg: EmbeddingConfig) -> Result<Self> {
        let mut client = Client::new()?;
        if let Some(ref base) = cfg.base_url {
            client.allow_url_host(base)?;
        }
        Ok(Self { cfg, client })
    }

    fn base_url(&self, fallback: &str) -> String {
        self.cfg.base_url.as_deref().unwrap_or(fallback).trim_end_matches('/').to_string()
    }

    // ── Ollama ─────────────────────────────────────────────────────────────

    async fn embed_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.base_url("http://localhost:11434"));
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let body = serde_json::json!({"model": &self.cfg.model, "prompt": text});
            let resp: serde_json::Value = self.client.post(&url)?.json(&body).send().await?
                .json().await?;
            out.push(parse_vector(&resp["embedding"])?);
        }
        Ok(out)
    }

    // ── OpenAI / compatible ────────────────────────────────────────────────

    async fn embed_openai_style(&self, url: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": &self.cfg.model,
            "input": texts,
        });
        let mut req = self.client.post(url)?.json(&body);
        if let Some(ref k) = self.cfg.api_key {
            req = req.bearer_auth(k);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let json: serde_json::Value = resp.json().await?;
        if !status.is_success() {
            return Err(DbError::Embedding(format!(
                "embedding endpoint returned {}: {}",
                status,
                json["error"]["message"].as_str().unwrap_or("unknown error")
            )));
        }
        json["data"]
            .as_array()
            .ok_or_else(|| DbError::Embedding("response has no 'data' array".to_string()))?
            .iter()
            .map(|item| parse_vector(&item["embedding"]))
            .collect()
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    #[instrument(skip(self, texts), fields(n = texts.len(), backend = ?self.cfg.backend))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.cfg.batch_size.max(1)) {
            let vecs = match self.cfg.backend {
                EmbeddingBackend::Ollama => self.embed_ollama(batch).await?,
                EmbeddingBackend::OpenAi => {
                    self.embed_openai_style("https://api.openai.com/v1/embeddings", batch).await?
                }
                EmbeddingBackend::OpenAiCompatible => {
                    let url = format!("{}/v1/embeddings", self.base_url("http://localhost:11434"));
                    self.embed_openai_style(&url, batch).await?
                }
            };
            if vecs.len() != batch.len() {
                return Err(DbError::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vecs.len()
                )));
            }
            out.extend(vecs);
        }
        Ok(out)
    }

    fn model_id(&self) -> &str { &self.cfg.model }
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    let arr = value
        .as_array()
        .ok_or_else(|| DbError::Embedding("missing embedding vector".to_string()))?;
    Ok(arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}
