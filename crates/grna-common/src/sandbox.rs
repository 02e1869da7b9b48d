use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::GrnaError;

/// Default per-request timeout applied to every outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP client that only talks to approved hosts.
///
/// Every outbound call made by the pipeline (E-utilities, the vector store,
/// embedding and LLM endpoints) goes through this client so a misconfigured
/// URL fails loudly instead of leaking data to an unexpected host.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist and timeout.
    pub fn new() -> Result<Self, GrnaError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a client with the default allowlist and the given timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, GrnaError> {
        let mut allowlist = HashSet::new();
        let domains = [
            "eutils.ncbi.nlm.nih.gov", // PubMed E-utilities
            "localhost",               // ChromaDB, Ollama
            "127.0.0.1",
            "api.openai.com",
            "api.anthropic.com",
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("grna-rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GrnaError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Allows the host of `url`, e.g. a configured ChromaDB or Ollama base URL.
    pub fn allow_url_host(&mut self, url: &str) -> Result<(), GrnaError> {
        let parsed = Url::parse(url)
            .map_err(|e| GrnaError::Config(format!("invalid URL '{}': {}", url, e)))?;
        match parsed.host_str() {
            Some(host) => {
                self.allow_domain(host);
                Ok(())
            }
            None => Err(GrnaError::Config(format!("URL '{}' has no host", url))),
        }
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Check exact match or if it's a subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn check(&self, url: &str) -> Result<(), GrnaError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(GrnaError::SecurityError(format!(
                "domain not in allowlist for URL {}",
                url
            )))
        }
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, GrnaError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, GrnaError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    pub fn delete(&self, url: &str) -> Result<reqwest::RequestBuilder, GrnaError> {
        self.check(url)?;
        Ok(self.client.delete(url))
    }
}
