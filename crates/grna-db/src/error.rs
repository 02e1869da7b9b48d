//! Store adapter error types.

use grna_common::{DocumentError, GrnaError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("vector store unreachable at {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("Collection not found: {0}")]
    NotFound(String),

    #[error("Document '{id}' not found in collection '{collection}'")]
    MissingDocument { collection: String, id: String },

    #[error("Duplicate id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    #[error("Payload too large for collection '{collection}': {size} documents exceeds limit of {limit}")]
    PayloadTooLarge { collection: String, size: usize, limit: usize },

    #[error("Invalid document: {0}")]
    Document(#[from] DocumentError),

    #[error("Store API error [{status}]: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Invalid store response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Client(#[from] GrnaError),
}

impl From<reqwest::Error> for DbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            DbError::Connection {
                endpoint: err.url().map(|u| u.to_string()).unwrap_or_default(),
                message: err.to_string(),
            }
        } else {
            DbError::Http(err)
        }
    }
}

impl DbError {
    /// True for failures that mean the store itself could not be reached.
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection { .. })
    }
}
