use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use crate::ingestion::chunker::ChunkError;
use crate::ingestion::ingest::IngestError;
use crate::ingestion::loaders::LoadError;
use crate::llm_client::LlmError;
use crate::retrieval::RetrievalError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No documents indexed yet")]
    IndexNotBuilt,

    #[error("Index is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ChunkError> for AppError {
    fn from(e: ChunkError) -> Self {
        AppError::Configuration(e.to_string())
    }
}

impl From<EmbeddingError> for AppError {
    fn from(e: EmbeddingError) -> Self {
        match e {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                AppError::DimensionMismatch { expected, actual }
            }
            other => AppError::EmbeddingUnavailable(other.to_string()),
        }
    }
}

impl From<IndexError> for AppError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::DimensionMismatch { expected, actual } => {
                AppError::DimensionMismatch { expected, actual }
            }
            IndexError::Corrupt(msg) => AppError::IndexCorrupt(msg),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<RetrievalError> for AppError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::IndexNotBuilt => AppError::IndexNotBuilt,
            e @ RetrievalError::ModelMismatch { .. } => AppError::Configuration(e.to_string()),
            RetrievalError::Embedding(e) => e.into(),
            RetrievalError::Index(e) => e.into(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Chunking(e) => e.into(),
            IngestError::Embedding(e) => e.into(),
            IngestError::Index(e) => e.into(),
            e @ IngestError::ModelMismatch { .. } => AppError::Configuration(e.to_string()),
        }
    }
}

impl From<LoadError> for AppError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Unsupported(_) | LoadError::InvalidName(_) => {
                AppError::Validation(e.to_string())
            }
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::ModelNotFound(model) => AppError::NotFound(format!(
                "Generation model '{model}' is not installed. Run: ollama pull {model}"
            )),
            other => AppError::Llm(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Configuration(msg) => {
                (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR", msg.clone())
            }
            AppError::EmbeddingUnavailable(msg) => {
                tracing::error!("Embedding error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "EMBEDDING_UNAVAILABLE",
                    format!("The embedding model could not be reached: {msg}"),
                )
            }
            AppError::DimensionMismatch { .. } => {
                tracing::error!("{self}");
                (StatusCode::CONFLICT, "DIMENSION_MISMATCH", self.to_string())
            }
            AppError::IndexNotBuilt => (
                StatusCode::CONFLICT,
                "INDEX_NOT_BUILT",
                "No documents indexed yet. Ingest documents first.".to_string(),
            ),
            AppError::IndexCorrupt(msg) => {
                tracing::error!("Index corrupt: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INDEX_CORRUPT",
                    "The stored index could not be read. Clear it and ingest documents again."
                        .to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "The language model failed to produce a response".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
