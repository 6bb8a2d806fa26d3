//! Document ingestion: loading, sanitising, chunking and indexing.

pub mod chunker;
pub mod handlers;
pub mod ingest;
pub mod loaders;
pub mod sanitizer;
