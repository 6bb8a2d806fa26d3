pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers as generation;
use crate::ingestion::handlers as ingestion;
use crate::retrieval::handlers as retrieval;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Index API
        .route(
            "/api/v1/index",
            get(ingestion::handle_index_status).delete(ingestion::handle_clear_index),
        )
        .route("/api/v1/index/ingest", post(ingestion::handle_reindex))
        .route(
            "/api/v1/index/documents",
            post(ingestion::handle_ingest_document),
        )
        .route(
            "/api/v1/sources/:source_type",
            post(ingestion::handle_upload_sources),
        )
        // Retrieval API
        .route("/api/v1/keywords", post(retrieval::handle_keywords))
        .route("/api/v1/retrieve", post(retrieval::handle_retrieve))
        // Generation API
        .route(
            "/api/v1/generate/resume",
            post(generation::handle_generate_resume),
        )
        .route(
            "/api/v1/generate/cover-letter",
            post(generation::handle_generate_cover_letter),
        )
        .with_state(state)
}
