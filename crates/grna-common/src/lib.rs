//! grna-common: Shared types, errors, and the sandboxed HTTP client used
//! across all grna crates.

pub mod error;
pub mod document;
pub mod sandbox;

// Re-export commonly used types
pub use document::{Document, Metadata, MetadataValue};
pub use error::{DocumentError, GrnaError};
