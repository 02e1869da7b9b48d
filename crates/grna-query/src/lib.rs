//! grna-query: retrieval over the plasmid corpus.
//!
//! - similarity and metadata search ([`QueryInterface`])
//! - human and LLM-context rendering ([`render`])
//! - retrieval-augmented answers ([`rag`])

pub mod rag;
pub mod render;
pub mod search;

use grna_db::DbError;
use grna_llm::LlmError;
use thiserror::Error;

pub use rag::{build_prompt, RagAnswer, RagAnswerer, RAG_PREAMBLE};
pub use search::{QueryInterface, SearchResult, DEFAULT_FILTER_K, DEFAULT_K};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
