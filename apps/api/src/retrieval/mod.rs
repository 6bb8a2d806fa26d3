pub mod handlers;
pub mod keywords;
pub mod retriever;

use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::IndexError;

pub use keywords::{extract_keywords, extract_keywords_with, DomainVocabulary, KeywordEntry, KeywordSet};
pub use retriever::{KeywordQueryMode, RetrievalOptions, RetrievalResult, Retriever, ScoredChunk};

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The index holds no chunks; the caller should ingest documents first.
    #[error("no documents indexed yet")]
    IndexNotBuilt,

    #[error("index was built with embedding model '{indexed}', but '{configured}' is configured; clear the index and re-ingest")]
    ModelMismatch { indexed: String, configured: String },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Renders retrieved chunks as labelled blocks for the prompt.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "[Source: {} ({})]\n{}",
                c.chunk.origin_filename, c.chunk.source_type, c.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
