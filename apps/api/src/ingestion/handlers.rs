//! Axum route handlers for the Index and Sources APIs.

use std::path::PathBuf;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::index::{DocumentSummary, IndexStats};
use crate::ingestion::ingest::{ingest_documents, reindex_all, IngestReport};
use crate::ingestion::loaders::{load_document, save_upload};
use crate::models::document::{Document, SourceType};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IndexStatusResponse {
    pub built: bool,
    pub path: String,
    pub saved_at: Option<DateTime<Utc>>,
    pub stats: IndexStats,
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Deserialize)]
pub struct IngestDocumentRequest {
    pub filename: String,
    pub source_type: SourceType,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub saved: Vec<String>,
    pub report: IngestReport,
}

/// Saves `data` under the sources folder for `source_type`, then loads it
/// back the same way a reindex would.
fn save_and_load(
    sources_dir: &std::path::Path,
    source_type: SourceType,
    filename: &str,
    data: Bytes,
) -> Result<(PathBuf, Option<Document>), AppError> {
    let path = save_upload(sources_dir, source_type, filename, data)?;
    let document = load_document(&path, sources_dir)?;
    Ok((path, document))
}

/// GET /api/v1/index
pub async fn handle_index_status(
    State(state): State<AppState>,
) -> Result<Json<IndexStatusResponse>, AppError> {
    let handle = state.index.lock().await;
    handle.check_usable()?;
    Ok(Json(IndexStatusResponse {
        built: !handle.index().is_empty(),
        path: handle.path().display().to_string(),
        saved_at: handle.saved_at(),
        stats: handle.stats(),
        documents: handle.index().documents(),
    }))
}

/// POST /api/v1/index/ingest
///
/// Syncs the index with everything under SOURCES_DIR. Also the way to rebuild
/// over a rejected artifact.
pub async fn handle_reindex(
    State(state): State<AppState>,
) -> Result<Json<IngestReport>, AppError> {
    let mut handle = state.index.lock().await;
    let report = reindex_all(
        &mut handle,
        state.embedder.as_ref(),
        &state.config.sources_dir,
        &state.config.chunking,
    )
    .await?;
    Ok(Json(report))
}

/// POST /api/v1/index/documents
///
/// Stores one text document in its source folder and ingests it, replacing
/// any previous version with the same filename.
pub async fn handle_ingest_document(
    State(state): State<AppState>,
    Json(request): Json<IngestDocumentRequest>,
) -> Result<Json<IngestReport>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }
    state.index.lock().await.check_usable()?;

    let (path, document) = save_and_load(
        &state.config.sources_dir,
        request.source_type,
        &request.filename,
        Bytes::from(request.text),
    )?;
    let document = document.ok_or_else(|| {
        AppError::Validation(format!("{} holds no usable text", path.display()))
    })?;

    let mut handle = state.index.lock().await;
    let report = ingest_documents(
        &mut handle,
        state.embedder.as_ref(),
        &[document],
        &state.config.chunking,
    )
    .await?;
    Ok(Json(report))
}

/// DELETE /api/v1/index
pub async fn handle_clear_index(
    State(state): State<AppState>,
) -> Result<Json<IndexStats>, AppError> {
    let mut handle = state.index.lock().await;
    handle.clear()?;
    Ok(Json(handle.stats()))
}

/// POST /api/v1/sources/:source_type
///
/// Multipart upload. Each file part is saved into the source folder and
/// ingested.
pub async fn handle_upload_sources(
    State(state): State<AppState>,
    Path(source_type): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let source_type: SourceType = source_type.parse().map_err(AppError::Validation)?;
    state.index.lock().await.check_usable()?;

    let mut saved = Vec::new();
    let mut documents = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read {filename}: {e}")))?;

        let (path, document) = save_and_load(&state.config.sources_dir, source_type, &filename, data)?;
        info!("Saved upload to {}", path.display());
        saved.push(path.display().to_string());
        documents.extend(document);
    }

    if saved.is_empty() {
        return Err(AppError::Validation("No files in upload".to_string()));
    }

    let mut handle = state.index.lock().await;
    let report = ingest_documents(
        &mut handle,
        state.embedder.as_ref(),
        &documents,
        &state.config.chunking,
    )
    .await?;
    Ok(Json(UploadResponse { saved, report }))
}
