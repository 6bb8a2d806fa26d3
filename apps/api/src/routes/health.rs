use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::embedding::EmbeddingError;
use crate::state::AppState;

/// Turns a failed probe into something the user can act on.
fn probe_message(err: &EmbeddingError, state: &AppState) -> String {
    let config = &state.config;
    match err {
        EmbeddingError::Unavailable { .. } => format!(
            "Model server not reachable at {}. Start it with 'ollama serve'.",
            config.ollama_base_url
        ),
        EmbeddingError::ModelNotFound(_) => format!(
            "Model not found. Run: ollama pull {} and ollama pull {}",
            config.embedding_model, config.llm_model
        ),
        other => format!("Embedding error: {other}"),
    }
}

/// GET /health
/// Reports service status and whether the embedding model answers a probe.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let probe = state.embedder.embed(&["test".to_string()]).await;
    let embedding = match &probe {
        Ok(vectors) => json!({
            "ok": true,
            "model": state.embedder.model(),
            "dimension": vectors.first().map(Vec::len),
        }),
        Err(e) => {
            warn!("Embedding probe failed: {e}");
            json!({
                "ok": false,
                "model": state.embedder.model(),
                "message": probe_message(e, &state),
            })
        }
    };

    let (chunks, rejected) = {
        let handle = state.index.lock().await;
        (handle.index().len(), handle.rejected().map(str::to_string))
    };

    Json(json!({
        "status": if probe.is_ok() && rejected.is_none() { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "service": "tailor-api",
        "embedding": embedding,
        "llm_model": state.llm.model(),
        "index": { "chunks": chunks, "built": chunks > 0, "rejected": rejected },
    }))
}
