//! Index artifact on disk and the handle that owns the live index.
//!
//! The artifact is a single JSON document carrying a schema marker and
//! version. Writes go to a temp file in the target directory and are renamed
//! into place, so readers only ever see a complete artifact. Loading
//! validates everything before an index is built from it.

use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use super::vector_index::{IndexEntry, IndexStats, VectorIndex};
use super::{IndexError, Result};
use crate::embedding::EmbeddingCache;

pub const INDEX_SCHEMA: &str = "tailor-index";
pub const INDEX_VERSION: u32 = 1;

#[derive(Deserialize)]
struct ArtifactHeader {
    schema: String,
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct IndexArtifact {
    schema: String,
    version: u32,
    dimension: Option<usize>,
    embedding_model: Option<String>,
    saved_at: DateTime<Utc>,
    chunks: Vec<IndexEntry>,
    #[serde(default)]
    cache: EmbeddingCache,
}

fn corrupt(msg: impl Into<String>) -> IndexError {
    IndexError::Corrupt(msg.into())
}

impl IndexArtifact {
    fn validate(&self) -> Result<()> {
        if self.chunks.is_empty() {
            return Ok(());
        }
        let dim = self
            .dimension
            .filter(|d| *d > 0)
            .ok_or_else(|| corrupt("artifact has chunks but no dimension"))?;

        let mut ids = HashSet::with_capacity(self.chunks.len());
        for entry in &self.chunks {
            if entry.vector.len() != dim {
                return Err(corrupt(format!(
                    "chunk {} has {} dimensions, expected {dim}",
                    entry.chunk.id,
                    entry.vector.len()
                )));
            }
            if !ids.insert(entry.chunk.id) {
                return Err(corrupt(format!("duplicate chunk id {}", entry.chunk.id)));
            }
        }
        if self.cache.vectors().any(|v| v.len() != dim) {
            return Err(corrupt("embedding cache holds vectors of the wrong dimension"));
        }
        Ok(())
    }
}

/// Reads and validates an artifact. Nothing is returned unless the whole
/// artifact checks out.
fn load_artifact(path: &Path) -> Result<(VectorIndex, DateTime<Utc>)> {
    let data = std::fs::read(path)?;

    let header: ArtifactHeader = serde_json::from_slice(&data)
        .map_err(|e| corrupt(format!("unreadable header: {e}")))?;
    if header.schema != INDEX_SCHEMA {
        return Err(corrupt(format!("unknown schema '{}'", header.schema)));
    }
    if header.version != INDEX_VERSION {
        return Err(corrupt(format!(
            "unsupported version {} (expected {INDEX_VERSION})",
            header.version
        )));
    }

    let artifact: IndexArtifact =
        serde_json::from_slice(&data).map_err(|e| corrupt(format!("malformed body: {e}")))?;
    artifact.validate()?;

    let saved_at = artifact.saved_at;
    let dimension = if artifact.chunks.is_empty() {
        None
    } else {
        artifact.dimension
    };
    let index = VectorIndex::from_parts(
        dimension,
        artifact.embedding_model,
        artifact.chunks,
        artifact.cache,
    );
    Ok((index, saved_at))
}

fn write_artifact(path: &Path, index: &VectorIndex) -> Result<DateTime<Utc>> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let saved_at = Utc::now();
    let artifact = IndexArtifact {
        schema: INDEX_SCHEMA.to_string(),
        version: INDEX_VERSION,
        dimension: index.dimension(),
        embedding_model: index.embedding_model().map(str::to_string),
        saved_at,
        chunks: index.entries().to_vec(),
        cache: index.cache().clone(),
    };

    let mut tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, &artifact)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;
    Ok(saved_at)
}

/// Owns the live index and its artifact path.
///
/// Lifecycle: `open` at startup (or at the start of a session), mutate via
/// `index_mut`, `persist` after a successful ingestion. Retrieval only reads.
pub struct IndexHandle {
    path: PathBuf,
    index: VectorIndex,
    saved_at: Option<DateTime<Utc>>,
    /// Why the artifact on disk was rejected. Set until it is cleared or
    /// overwritten by a successful persist.
    rejected: Option<String>,
}

impl IndexHandle {
    /// Opens the artifact at `path`. A missing file gives an empty index; a
    /// present but invalid one is an error, never a partial index.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            info!("No index at {}, starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let (index, saved_at) = load_artifact(&path)?;
        info!(
            "Loaded index from {} ({} chunks, dimension {:?})",
            path.display(),
            index.len(),
            index.dimension()
        );
        Ok(Self {
            path,
            index,
            saved_at: Some(saved_at),
            rejected: None,
        })
    }

    /// Like `open`, but a rejected artifact does not stop the service: the
    /// handle starts empty and reports the rejection through `usable_index`
    /// until the index is cleared or rebuilt. The file is left in place.
    pub fn open_or_quarantine(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match Self::open(path.clone()) {
            Err(IndexError::Corrupt(reason)) => {
                error!(
                    "Index artifact at {} rejected: {reason}. Clear the index or re-ingest.",
                    path.display()
                );
                Ok(Self {
                    rejected: Some(reason),
                    ..Self::empty(path)
                })
            }
            other => other,
        }
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            index: VectorIndex::new(),
            saved_at: None,
            rejected: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// The index for reading, or `Corrupt` while a rejected artifact is
    /// still in place.
    pub fn usable_index(&self) -> Result<&VectorIndex> {
        self.check_usable()?;
        Ok(&self.index)
    }

    pub fn check_usable(&self) -> Result<()> {
        match &self.rejected {
            Some(reason) => Err(IndexError::Corrupt(reason.clone())),
            None => Ok(()),
        }
    }

    pub fn rejected(&self) -> Option<&str> {
        self.rejected.as_deref()
    }

    pub fn index_mut(&mut self) -> &mut VectorIndex {
        &mut self.index
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }

    /// Prunes cache entries no chunk refers to, then writes the artifact
    /// atomically.
    pub fn persist(&mut self) -> Result<()> {
        if let Some(model) = self.index.embedding_model().map(str::to_string) {
            let live: Vec<String> = self
                .index
                .entries()
                .iter()
                .map(|e| e.chunk.text.clone())
                .collect();
            self.index
                .cache_mut()
                .retain_texts(&model, live.iter().map(String::as_str));
        }

        let saved_at = write_artifact(&self.path, &self.index)?;
        self.saved_at = Some(saved_at);
        self.rejected = None;
        info!(
            "Persisted index to {} ({} chunks)",
            self.path.display(),
            self.index.len()
        );
        Ok(())
    }

    /// Empties the index and deletes the artifact.
    pub fn clear(&mut self) -> Result<()> {
        self.index.clear();
        self.saved_at = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove index artifact: {e}");
                return Err(e.into());
            }
        }
        self.rejected = None;
        info!("Cleared index at {}", self.path.display());
        Ok(())
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }
}
