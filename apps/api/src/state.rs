use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::index::IndexHandle;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// The one live index. Writers (ingest, clear) and readers (retrieval)
    /// take the lock in turn; generation releases it before the LLM call.
    pub index: Arc<Mutex<IndexHandle>>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: LlmClient,
}

impl AppState {
    pub fn new(config: Config, index: IndexHandle, embedder: Arc<dyn Embedder>, llm: LlmClient) -> Self {
        Self {
            config,
            index: Arc::new(Mutex::new(index)),
            embedder,
            llm,
        }
    }
}
