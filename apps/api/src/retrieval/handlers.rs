//! Axum route handlers for keyword extraction and retrieval.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::document::SourceType;
use crate::retrieval::keywords::{extract_keywords_with, KeywordSet, DEFAULT_MAX_KEYWORDS};
use crate::retrieval::{
    format_context, KeywordQueryMode, RetrievalOptions, Retriever, ScoredChunk,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KeywordsRequest {
    pub job_description: String,
    #[serde(default)]
    pub max_keywords: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub job_description: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub source_types: Option<Vec<SourceType>>,
    #[serde(default)]
    pub keyword_mode: Option<KeywordQueryMode>,
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub chunks: Vec<ScoredChunk>,
    pub keywords: KeywordSet,
    pub query_count: usize,
    /// The chunks rendered the way the prompt sees them.
    pub context: String,
}

/// Merges per-request overrides with the configured defaults.
pub(crate) fn resolve_options(
    config: &Config,
    top_k: Option<usize>,
    source_types: Option<&[SourceType]>,
    keyword_mode: Option<KeywordQueryMode>,
) -> Result<RetrievalOptions, AppError> {
    let source_types = match source_types {
        Some(types) if types.is_empty() => {
            return Err(AppError::Validation(
                "source_types must enable at least one source type".to_string(),
            ))
        }
        Some(types) => types.iter().copied().collect(),
        None => config.enabled_source_types.clone(),
    };
    Ok(RetrievalOptions {
        top_k: top_k.unwrap_or(config.retrieval_top_k),
        source_types,
        keyword_mode: keyword_mode.unwrap_or(config.keyword_query_mode),
        domain_vocabulary: config.domain_vocabulary.clone(),
    })
}

/// POST /api/v1/keywords
pub async fn handle_keywords(
    State(state): State<AppState>,
    Json(request): Json<KeywordsRequest>,
) -> Json<KeywordSet> {
    let max = request.max_keywords.unwrap_or(DEFAULT_MAX_KEYWORDS);
    Json(extract_keywords_with(
        &request.job_description,
        max,
        &state.config.domain_vocabulary,
    ))
}

/// POST /api/v1/retrieve
pub async fn handle_retrieve(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let options = resolve_options(
        &state.config,
        request.top_k,
        request.source_types.as_deref(),
        request.keyword_mode,
    )?;

    let handle = state.index.lock().await;
    let result = Retriever::new(handle.usable_index()?, state.embedder.as_ref())
        .retrieve(&request.job_description, &options)
        .await?;
    drop(handle);

    Ok(Json(RetrieveResponse {
        context: format_context(&result.chunks),
        chunks: result.chunks,
        keywords: result.keywords,
        query_count: result.query_count,
    }))
}
