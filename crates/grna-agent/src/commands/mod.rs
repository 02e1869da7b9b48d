//! Subcommand implementations.

pub mod ask;
pub mod demo;
pub mod ingest;
pub mod query;
pub mod sync;
