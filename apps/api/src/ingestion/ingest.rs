//! Ingestion pipeline: documents → chunks → vectors → index → artifact.
//!
//! Each document is committed on its own. Its old chunks are swapped for the
//! new ones only once every new chunk has a vector, so a failure never leaves
//! a chunk without its embedding. Work committed before a failure is persisted
//! before the error is returned.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::{check_batch, Embedder, EmbeddingError};
use crate::index::{IndexEntry, IndexError, IndexHandle, VectorIndex};
use crate::ingestion::chunker::{chunk_document, ChunkError, ChunkingConfig};
use crate::ingestion::loaders::load_documents_from_dir;
use crate::models::document::{document_id, Chunk, Document};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Chunking(#[from] ChunkError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("index was built with embedding model '{indexed}', but '{configured}' is configured; clear the index and re-ingest")]
    ModelMismatch { indexed: String, configured: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub origin_filename: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// Chunks sent to the embedding model.
    pub embedded: usize,
    /// Chunks whose vector came from the embedding cache.
    pub cache_hits: usize,
    /// Documents dropped because their source file is gone.
    pub removed: usize,
    pub skipped: Vec<SkippedFile>,
    pub index_chunks: usize,
}

/// Vectors from a different model are not comparable with what is stored.
pub(crate) fn ensure_same_model(index: &VectorIndex, embedder: &dyn Embedder) -> Result<(), IngestError> {
    match index.embedding_model() {
        Some(indexed) if !index.is_empty() && indexed != embedder.model() => {
            Err(IngestError::ModelMismatch {
                indexed: indexed.to_string(),
                configured: embedder.model().to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Chunks, embeds and commits a single document.
async fn ingest_document(
    index: &mut VectorIndex,
    embedder: &dyn Embedder,
    document: &Document,
    chunking: &ChunkingConfig,
    report: &mut IngestReport,
) -> Result<(), IngestError> {
    let model = embedder.model();
    let chunks: Vec<Chunk> = chunk_document(document, chunking)?.collect();

    let mut vectors: Vec<Option<Vec<f32>>> = chunks
        .iter()
        .map(|c| index.cache().get(model, &c.text).cloned())
        .collect();
    let misses: Vec<usize> = (0..chunks.len()).filter(|&i| vectors[i].is_none()).collect();

    let mut fresh_pairs: Vec<(String, Vec<f32>)> = Vec::with_capacity(misses.len());
    if !misses.is_empty() {
        let texts: Vec<String> = misses.iter().map(|&i| chunks[i].text.clone()).collect();
        let fresh = embedder.embed(&texts).await?;
        check_batch(texts.len(), &fresh)?;
        for ((&i, text), vector) in misses.iter().zip(texts).zip(fresh) {
            vectors[i] = Some(vector.clone());
            fresh_pairs.push((text, vector));
        }
    }

    let entries: Vec<IndexEntry> = chunks
        .into_iter()
        .zip(vectors)
        .filter_map(|(chunk, vector)| vector.map(|vector| IndexEntry { chunk, vector }))
        .collect();
    let chunk_count = entries.len();

    index.replace_document(document.id, entries)?;
    index.set_embedding_model(model);
    // Cached only once committed, so a rejected vector is never reused.
    for (text, vector) in fresh_pairs {
        index.cache_mut().insert(model, &text, vector);
    }

    let hits = chunk_count - misses.len();
    debug!(
        "Indexed {} ({} chunks, {} embedded, {} from cache)",
        document.origin_filename,
        chunk_count,
        misses.len(),
        hits
    );
    report.documents += 1;
    report.chunks += chunk_count;
    report.embedded += misses.len();
    report.cache_hits += hits;
    Ok(())
}

/// Ingests documents one by one without the final persist. On failure the
/// documents committed so far are persisted and the error is returned.
async fn ingest_all(
    handle: &mut IndexHandle,
    embedder: &dyn Embedder,
    documents: &[Document],
    chunking: &ChunkingConfig,
    report: &mut IngestReport,
) -> Result<(), IngestError> {
    chunking.validate()?;
    ensure_same_model(handle.index(), embedder)?;

    for document in documents {
        let result =
            ingest_document(handle.index_mut(), embedder, document, chunking, report).await;
        if let Err(e) = result {
            warn!(
                "Ingestion stopped at {} after {} documents: {e}",
                document.origin_filename, report.documents
            );
            if report.documents > 0 {
                handle.persist()?;
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Ingests `documents` with replace-by-filename semantics and persists the index.
/// Refused while a rejected artifact is in place; `reindex_all` rebuilds it.
pub async fn ingest_documents(
    handle: &mut IndexHandle,
    embedder: &dyn Embedder,
    documents: &[Document],
    chunking: &ChunkingConfig,
) -> Result<IngestReport, IngestError> {
    handle.check_usable()?;
    let mut report = IngestReport::default();
    ingest_all(handle, embedder, documents, chunking, &mut report).await?;
    handle.persist()?;
    report.index_chunks = handle.index().len();

    info!(
        "Ingested {} documents: {} chunks ({} embedded, {} cached), index holds {}",
        report.documents, report.chunks, report.embedded, report.cache_hits, report.index_chunks
    );
    Ok(report)
}

/// Syncs the index with the sources tree: every file found is (re)ingested,
/// then documents whose files are gone are removed. Removal only happens when
/// every document was ingested. Files that exist but failed to load keep
/// their previously indexed chunks.
pub async fn reindex_all(
    handle: &mut IndexHandle,
    embedder: &dyn Embedder,
    sources_dir: &Path,
    chunking: &ChunkingConfig,
) -> Result<IngestReport, IngestError> {
    let loaded = load_documents_from_dir(sources_dir);
    info!(
        "Found {} documents under {} ({} skipped)",
        loaded.documents.len(),
        sources_dir.display(),
        loaded.skipped.len()
    );

    let mut report = IngestReport {
        skipped: loaded
            .skipped
            .iter()
            .map(|(origin_filename, reason)| SkippedFile {
                origin_filename: origin_filename.clone(),
                reason: reason.clone(),
            })
            .collect(),
        ..IngestReport::default()
    };
    ingest_all(handle, embedder, &loaded.documents, chunking, &mut report).await?;

    let live: HashSet<Uuid> = loaded
        .documents
        .iter()
        .map(|d| d.id)
        .chain(loaded.skipped.iter().map(|(origin, _)| document_id(origin)))
        .collect();
    let stale: Vec<_> = handle
        .index()
        .documents()
        .into_iter()
        .filter(|d| !live.contains(&d.document_id))
        .collect();
    for doc in &stale {
        let removed = handle.index_mut().remove_document(doc.document_id);
        info!("Removed {} ({removed} chunks): source file is gone", doc.origin_filename);
    }
    report.removed = stale.len();

    handle.persist()?;
    report.index_chunks = handle.index().len();
    info!(
        "Reindexed {} documents: {} chunks ({} embedded, {} cached), {} removed, index holds {}",
        report.documents,
        report.chunks,
        report.embedded,
        report.cache_hits,
        report.removed,
        report.index_chunks
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;

    use super::*;
    use crate::embedding::testing::FakeEmbedder;
    use crate::models::document::SourceType;

    const VOCAB: &[&str] = &[
        "policy", "budget", "legislation", "casework", "constituent", "hearing", "analysis",
    ];

    fn chunking() -> ChunkingConfig {
        ChunkingConfig::new(80, 20).unwrap()
    }

    fn resume_v1() -> Document {
        let text = "Legislative aide handling constituent casework and budget analysis. \
                    Drafted policy memos for committee hearing preparation. \
                    Tracked legislation through the Assembly and Senate floors.";
        assert!(text.chars().count() >= 150);
        Document::new(SourceType::Resume, "resumes/resume_v1.txt", text.to_string())
    }

    fn doc(origin: &str, text: &str) -> Document {
        Document::new(SourceType::Experience, origin, text.to_string())
    }

    /// Fails any batch containing a marker word.
    struct PoisonedEmbedder {
        inner: FakeEmbedder,
        marker: &'static str,
    }

    #[async_trait]
    impl Embedder for PoisonedEmbedder {
        fn model(&self) -> &str {
            self.inner.model()
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.iter().any(|t| t.contains(self.marker)) {
                return Err(EmbeddingError::Unavailable {
                    attempts: 3,
                    message: "connection reset".into(),
                });
            }
            self.inner.embed(texts).await
        }
    }

    #[tokio::test]
    async fn test_reingesting_unchanged_document_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = IndexHandle::open(dir.path().join("index.json")).unwrap();
        let embedder = FakeEmbedder::new(VOCAB);

        let first = ingest_documents(&mut handle, &embedder, &[resume_v1()], &chunking())
            .await
            .unwrap();
        let ids_after_first: Vec<Uuid> =
            handle.index().entries().iter().map(|e| e.chunk.id).collect();
        assert!(first.chunks > 1, "text should span several chunks");
        assert_eq!(first.embedded, first.chunks);

        let second = ingest_documents(&mut handle, &embedder, &[resume_v1()], &chunking())
            .await
            .unwrap();
        let ids_after_second: Vec<Uuid> =
            handle.index().entries().iter().map(|e| e.chunk.id).collect();

        assert_eq!(handle.index().len(), first.chunks, "no duplicate accumulation");
        assert_eq!(ids_after_first, ids_after_second);
        assert_eq!(second.embedded, 0, "unchanged text comes from the cache");
        assert_eq!(second.cache_hits, first.chunks);
        assert_eq!(
            embedder.texts_embedded.load(Ordering::SeqCst),
            first.chunks,
            "second run made no embedding calls"
        );
    }

    #[tokio::test]
    async fn test_changed_document_replaces_old_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = IndexHandle::open(dir.path().join("index.json")).unwrap();
        let embedder = FakeEmbedder::new(VOCAB);

        ingest_documents(&mut handle, &embedder, &[resume_v1()], &chunking())
            .await
            .unwrap();
        let shorter = Document::new(
            SourceType::Resume,
            "resumes/resume_v1.txt",
            "Budget analyst.".to_string(),
        );
        ingest_documents(&mut handle, &embedder, &[shorter], &chunking())
            .await
            .unwrap();

        assert_eq!(handle.index().len(), 1);
        assert_eq!(handle.index().entries()[0].chunk.text, "Budget analyst.");
        assert_eq!(handle.index().documents().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_and_persists_committed_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut handle = IndexHandle::open(&path).unwrap();
        let embedder = PoisonedEmbedder {
            inner: FakeEmbedder::new(VOCAB),
            marker: "POISON",
        };

        let docs = [
            doc("experiences/a.md", "Casework for constituent requests."),
            doc("experiences/b.md", "POISON budget hearing notes."),
            doc("experiences/c.md", "Policy analysis for legislation."),
        ];
        let err = ingest_documents(&mut handle, &embedder, &docs, &chunking())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Embedding(EmbeddingError::Unavailable { .. })));

        let origins: Vec<String> = handle
            .index()
            .documents()
            .into_iter()
            .map(|d| d.origin_filename)
            .collect();
        assert_eq!(origins, vec!["experiences/a.md"]);

        let reopened = IndexHandle::open(&path).unwrap();
        assert_eq!(reopened.index().len(), 1, "committed work was persisted");
    }

    #[tokio::test]
    async fn test_mismatched_batch_dimension_leaves_document_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = IndexHandle::open(dir.path().join("index.json")).unwrap();
        let embedder = FakeEmbedder::new(VOCAB);

        ingest_documents(
            &mut handle,
            &embedder,
            &[doc("experiences/a.md", "Casework notes.")],
            &chunking(),
        )
        .await
        .unwrap();

        embedder.pin("Budget hearing.", vec![1.0, 0.0]);
        let err = ingest_documents(
            &mut handle,
            &embedder,
            &[doc("experiences/a.md", "Budget hearing.")],
            &chunking(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, IngestError::Index(IndexError::DimensionMismatch { .. })));
        assert_eq!(handle.index().len(), 1);
        assert_eq!(handle.index().entries()[0].chunk.text, "Casework notes.");
    }

    #[tokio::test]
    async fn test_invalid_chunking_fails_before_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = IndexHandle::open(dir.path().join("index.json")).unwrap();
        let embedder = FakeEmbedder::new(VOCAB);
        let bad = ChunkingConfig {
            size: 100,
            overlap: 100,
        };

        let err = ingest_documents(&mut handle, &embedder, &[resume_v1()], &bad)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Chunking(ChunkError::InvalidOverlap { .. })));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(handle.index().is_empty());
    }

    #[tokio::test]
    async fn test_reindex_removes_documents_whose_files_are_gone() {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources");
        std::fs::create_dir_all(sources.join("resumes")).unwrap();
        std::fs::create_dir_all(sources.join("books")).unwrap();
        std::fs::write(sources.join("resumes/v1.txt"), "Budget analyst resume.").unwrap();
        std::fs::write(sources.join("books/style.md"), "Policy writing guide.").unwrap();

        let mut handle = IndexHandle::open(dir.path().join("index.json")).unwrap();
        let embedder = FakeEmbedder::new(VOCAB);

        let first = reindex_all(&mut handle, &embedder, &sources, &chunking())
            .await
            .unwrap();
        assert_eq!(first.documents, 2);
        assert_eq!(first.removed, 0);

        std::fs::remove_file(sources.join("books/style.md")).unwrap();
        let second = reindex_all(&mut handle, &embedder, &sources, &chunking())
            .await
            .unwrap();

        assert_eq!(second.removed, 1);
        assert_eq!(second.cache_hits, 1);
        let stats = handle.stats();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.by_source_type.get(&SourceType::Book), None);
        assert_eq!(stats.by_source_type.get(&SourceType::Resume), Some(&1));
    }

    #[tokio::test]
    async fn test_rejected_artifact_needs_a_full_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources");
        std::fs::create_dir_all(sources.join("resumes")).unwrap();
        std::fs::write(sources.join("resumes/v1.txt"), "Budget analyst resume.").unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{"schema":"tailor-index","version":9}"#).unwrap();

        let mut handle = IndexHandle::open_or_quarantine(&path).unwrap();
        let embedder = FakeEmbedder::new(VOCAB);

        let err = ingest_documents(&mut handle, &embedder, &[resume_v1()], &chunking())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Index(IndexError::Corrupt(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

        let report = reindex_all(&mut handle, &embedder, &sources, &chunking())
            .await
            .unwrap();
        assert_eq!(report.documents, 1);
        assert!(handle.rejected().is_none());
        assert_eq!(IndexHandle::open(&path).unwrap().index().len(), report.index_chunks);
    }

    #[tokio::test]
    async fn test_other_embedding_model_is_rejected() {
        struct OtherModel(FakeEmbedder);

        #[async_trait]
        impl Embedder for OtherModel {
            fn model(&self) -> &str {
                "other-embed"
            }

            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
                self.0.embed(texts).await
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut handle = IndexHandle::open(dir.path().join("index.json")).unwrap();
        ingest_documents(&mut handle, &FakeEmbedder::new(VOCAB), &[resume_v1()], &chunking())
            .await
            .unwrap();

        let err = ingest_documents(
            &mut handle,
            &OtherModel(FakeEmbedder::new(VOCAB)),
            &[resume_v1()],
            &chunking(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::ModelMismatch { .. }));
    }
}
