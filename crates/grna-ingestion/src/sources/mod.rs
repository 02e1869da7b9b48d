//! Bibliographic source clients.

pub mod pubmed;

use async_trait::async_trait;
use grna_common::GrnaError;
use thiserror::Error;

/// Per-identifier failure talking to a bibliographic service. The sync
/// engine logs and skips these.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request for {id} timed out")]
    Timeout { id: String },

    #[error("request for {id} failed: {message}")]
    Http { id: String, message: String },

    #[error("service returned {status} for {id}")]
    Status { id: String, status: u16 },

    #[error("malformed XML for {id}: {message}")]
    Xml { id: String, message: String },

    #[error(transparent)]
    Client(#[from] GrnaError),
}

impl SourceError {
    pub(crate) fn from_reqwest(id: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout { id: id.to_string() }
        } else {
            SourceError::Http { id: id.to_string(), message: err.to_string() }
        }
    }
}

/// Resolves publication identifiers and fetches abstracts.
#[async_trait]
pub trait BibliographicSource: Send + Sync {
    /// Map a PubMed Central id (`PMC…`) to its PubMed id. `Ok(None)` when
    /// the service links it to nothing.
    async fn resolve_pmcid(&self, pmcid: &str) -> Result<Option<String>, SourceError>;

    /// Concatenated abstract text for a PubMed id; `""` when it has none.
    async fn fetch_abstract(&self, pmid: &str) -> Result<String, SourceError>;
}
