//! grna-db: vector store adapters.
//!
//! Backends:
//!   - ChromaDB over HTTP ([`ChromaStore`])
//!   - in-process ([`MemoryStore`])
//!
//! Both implement [`VectorStore`]; ingestion and query code only ever see the
//! trait object.

pub mod chroma;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod store;

pub use chroma::{ChromaConfig, ChromaStore};
pub use embedding::{Embedder, EmbeddingBackend, EmbeddingClient, EmbeddingConfig};
pub use error::{DbError, Result};
pub use memory::MemoryStore;
pub use store::{Collection, CollectionInfo, Ensured, MetadataFilter, QueryHit, VectorStore};
