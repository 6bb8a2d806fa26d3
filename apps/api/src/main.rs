mod config;
mod embedding;
mod errors;
mod generation;
mod index;
mod ingestion;
mod llm_client;
mod models;
mod retrieval;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::index::IndexHandle;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; invalid values abort startup
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("tailor_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Load the persisted index (empty if none has been built yet). A rejected
    // artifact is reported to clients instead of stopping startup.
    let index = IndexHandle::open_or_quarantine(&config.index_path)?;
    let stats = index.stats();
    info!(
        "Index loaded from {} ({} chunks, {} documents)",
        config.index_path.display(),
        stats.chunks,
        stats.documents
    );

    // Initialize model clients
    let embedder = Arc::new(
        EmbeddingClient::new(config.ollama_base_url.clone(), config.embedding_model.clone())
            .with_batching(config.embed_batch_size, config.embed_concurrency),
    );
    let llm = LlmClient::new(config.ollama_base_url.clone(), config.llm_model.clone());
    info!(
        "Model clients initialized (embedding: {}, llm: {}) at {}",
        config.embedding_model, config.llm_model, config.ollama_base_url
    );

    let state = AppState::new(config.clone(), index, embedder, llm);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
