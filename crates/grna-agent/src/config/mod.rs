//! Configuration loading for grna.
//! Reads grna.toml from the current directory or the path in GRNA_CONFIG.
//! A missing file is not an error; every field has a default.

use std::path::Path;

use anyhow::Context;
use grna_db::{ChromaConfig, EmbeddingConfig};
use grna_ingestion::models::{
    ABSTRACT_COLLECTION, ABSTRACT_DESCRIPTION, PLASMID_COLLECTION, PLASMID_DESCRIPTION,
};
use grna_ingestion::sources::pubmed::EUTILS_BASE_URL;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub pubmed: PubMedConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

fn secret<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(d)?
        .filter(|s| !s.trim().is_empty())
        .map(SecretString::from))
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Client-side embeddings; unset means the server embeds.
    pub embedding: Option<EmbeddingConfig>,
}

fn default_host()           -> String { "localhost".to_string() }
fn default_port()           -> u16    { 8000 }
fn default_max_batch_size() -> usize  { 5461 }
fn default_page_size()      -> usize  { 1000 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_batch_size: default_max_batch_size(),
            page_size: default_page_size(),
            embedding: None,
        }
    }
}

impl StoreConfig {
    pub fn chroma(&self) -> ChromaConfig {
        ChromaConfig {
            host: self.host.clone(),
            port: self.port,
            max_batch_size: self.max_batch_size,
            page_size: self.page_size,
        }
    }
}

// ── Ingestion ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_plasmid_collection")]
    pub plasmid_collection: String,
    #[serde(default = "default_plasmid_description")]
    pub plasmid_description: String,
    #[serde(default = "default_abstract_collection")]
    pub abstract_collection: String,
    #[serde(default = "default_abstract_description")]
    pub abstract_description: String,
    #[serde(default = "default_json_key")]
    pub json_key: String,
}

fn default_data_file()            -> String { "data/grna_addgene.tsv".to_string() }
fn default_ingest_batch_size()    -> usize  { grna_ingestion::DEFAULT_BATCH_SIZE }
fn default_plasmid_collection()   -> String { PLASMID_COLLECTION.to_string() }
fn default_plasmid_description()  -> String { PLASMID_DESCRIPTION.to_string() }
fn default_abstract_collection()  -> String { ABSTRACT_COLLECTION.to_string() }
fn default_abstract_description() -> String { ABSTRACT_DESCRIPTION.to_string() }
fn default_json_key()             -> String { "plasmids".to_string() }

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            batch_size: default_ingest_batch_size(),
            plasmid_collection: default_plasmid_collection(),
            plasmid_description: default_plasmid_description(),
            abstract_collection: default_abstract_collection(),
            abstract_description: default_abstract_description(),
            json_key: default_json_key(),
        }
    }
}

// ── PubMed ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PubMedConfig {
    #[serde(default = "default_eutils_url")]
    pub base_url: String,
    #[serde(default, deserialize_with = "secret")]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_eutils_url()   -> String { EUTILS_BASE_URL.to_string() }
fn default_timeout_secs() -> u64    { 30 }
fn default_concurrency()  -> usize  { 1 }

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: default_eutils_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

// ── Query ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_filter_k")]
    pub filter_k: usize,
    #[serde(default = "default_demo_k")]
    pub demo_k: usize,
    #[serde(default = "default_demo_filter_k")]
    pub demo_filter_k: usize,
}

fn default_k()             -> usize { grna_query::DEFAULT_K }
fn default_filter_k()      -> usize { grna_query::DEFAULT_FILTER_K }
fn default_demo_k()        -> usize { 3 }
fn default_demo_filter_k() -> usize { 5 }

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            filter_k: default_filter_k(),
            demo_k: default_demo_k(),
            demo_filter_k: default_demo_filter_k(),
        }
    }
}

// ── LLM ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, deserialize_with = "secret")]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
}

fn default_anthropic_model() -> String { "claude-3-7-sonnet-latest".to_string() }
fn default_max_tokens()      -> u32    { 1500 }
fn default_anthropic_url()   -> String { grna_llm::backend::ANTHROPIC_BASE_URL.to_string() }

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: default_anthropic_model(),
            max_tokens: default_max_tokens(),
            api_key: None,
            base_url: default_anthropic_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_ollama_url()   -> String { grna_llm::backend::OLLAMA_BASE_URL.to_string() }
fn default_ollama_model() -> String { "llama3.2".to_string() }

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
            max_tokens: default_max_tokens(),
        }
    }
}


impl Config {
    /// Load configuration from grna.toml (or `GRNA_CONFIG`), then apply
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("GRNA_CONFIG").unwrap_or_else(|_| "grna.toml".to_string());

        let mut config = Self::from_path(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse `path`, or return the defaults when it does not exist.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides: CHROMADB_HOST, CHROMADB_PORT, NCBI_API_KEY, ANTHROPIC_API_KEY.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = set("CHROMADB_HOST") {
            self.store.host = host;
        }
        if let Some(port) = set("CHROMADB_PORT") {
            self.store.port = port
                .trim()
                .parse()
                .with_context(|| format!("CHROMADB_PORT is not a port number: {port}"))?;
        }
        if let Some(key) = set("NCBI_API_KEY") {
            self.pubmed.api_key = Some(SecretString::from(key));
        }
        if let Some(key) = set("ANTHROPIC_API_KEY") {
            self.llm.anthropic.api_key = Some(SecretString::from(key));
        }
        Ok(())
    }
}
