//! Vector index over chunk embeddings, plus its on-disk artifact.

mod store;
mod vector_index;

use thiserror::Error;
use uuid::Uuid;

pub use store::{IndexHandle, INDEX_SCHEMA, INDEX_VERSION};
pub use vector_index::{
    cosine_similarity, DocumentSummary, IndexEntry, IndexStats, SearchHit, VectorIndex,
};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("chunk {chunk_id} does not belong to document {document_id}")]
    ForeignChunk { chunk_id: Uuid, document_id: Uuid },

    #[error("index artifact rejected: {0}")]
    Corrupt(String),

    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
