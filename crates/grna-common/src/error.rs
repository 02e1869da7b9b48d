use thiserror::Error;

/// Validation failures raised when building a [`crate::Document`].
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("document id must not be empty")]
    EmptyId,

    #[error("document '{0}' has empty text")]
    EmptyText(String),

    #[error("metadata field '{field}' on document '{id}' is not a scalar ({kind})")]
    NonScalarMetadata { id: String, field: String, kind: &'static str },
}

#[derive(Debug, Error)]
pub enum GrnaError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    Document(#[from] DocumentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network capabilities capped: {0}")]
    SecurityError(String),
}

pub type Result<T> = std::result::Result<T, GrnaError>;
