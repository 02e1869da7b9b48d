//! Ingestion error types.

use std::path::PathBuf;

use grna_common::DocumentError;
use grna_db::DbError;
use thiserror::Error;

use crate::batch::BatchError;

pub type Result<T> = std::result::Result<T, IngestionError>;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("data file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{}: malformed TSV: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("record {index} has no id")]
    MissingId { index: usize },

    #[error("duplicate record id '{0}'")]
    DuplicateId(String),

    #[error("invalid document: {0}")]
    Document(#[from] DocumentError),

    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}
