//! Axum route handlers for the Generation API.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::generation::generator::{generate, DocumentKind, GenerateRequest, GenerateResponse};
use crate::retrieval::handlers::resolve_options;
use crate::retrieval::Retriever;
use crate::state::AppState;

/// Retrieves context under the index lock, then releases it for the
/// (slow) model call.
async fn run(
    state: AppState,
    kind: DocumentKind,
    request: GenerateRequest,
) -> Result<Json<GenerateResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let options = resolve_options(
        &state.config,
        request.top_k,
        request.source_types.as_deref(),
        request.keyword_mode,
    )?;

    let retrieved = {
        let handle = state.index.lock().await;
        Retriever::new(handle.usable_index()?, state.embedder.as_ref())
            .retrieve(&request.job_description, &options)
            .await?
    };

    let response = generate(kind, &request, retrieved, &state.llm).await?;
    Ok(Json(response))
}

/// POST /api/v1/generate/resume
pub async fn handle_generate_resume(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    run(state, DocumentKind::Resume, request).await
}

/// POST /api/v1/generate/cover-letter
pub async fn handle_generate_cover_letter(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    run(state, DocumentKind::CoverLetter, request).await
}
