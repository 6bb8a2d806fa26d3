//! In-memory nearest-neighbour index. Brute-force cosine similarity, which is
//! plenty for a personal corpus of a few hundred chunks.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{IndexError, Result};
use crate::embedding::EmbeddingCache;
use crate::models::document::{Chunk, SourceType};

/// One stored chunk and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A search result. `ordinal` is the entry's insertion position and breaks
/// score ties (earlier wins).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub document_id: Uuid,
    pub origin_filename: String,
    pub source_type: SourceType,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub documents: usize,
    pub by_source_type: BTreeMap<SourceType, usize>,
    pub dimension: Option<usize>,
    pub embedding_model: Option<String>,
    pub cached_embeddings: usize,
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    embedding_model: Option<String>,
    entries: Vec<IndexEntry>,
    positions: HashMap<Uuid, usize>,
    cache: EmbeddingCache,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an index from stored parts. Callers validate the parts first.
    pub(super) fn from_parts(
        dimension: Option<usize>,
        embedding_model: Option<String>,
        entries: Vec<IndexEntry>,
        cache: EmbeddingCache,
    ) -> Self {
        let mut index = Self {
            dimension,
            embedding_model,
            entries,
            positions: HashMap::new(),
            cache,
        };
        index.rebuild_positions();
        index
    }

    fn rebuild_positions(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk.id, i))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    pub fn set_embedding_model(&mut self, model: &str) {
        self.embedding_model = Some(model.to_string());
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, chunk_id: &Uuid) -> Option<&IndexEntry> {
        self.positions.get(chunk_id).map(|&i| &self.entries[i])
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut EmbeddingCache {
        &mut self.cache
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if vector.len() != expected => Err(IndexError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            None if vector.is_empty() => Err(IndexError::DimensionMismatch {
                expected: 1,
                actual: 0,
            }),
            _ => Ok(()),
        }
    }

    /// Inserts or replaces the entry keyed by `chunk.id`. A replaced entry
    /// keeps its insertion position. The first vector fixes the index dimension.
    pub fn add(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        self.dimension.get_or_insert(vector.len());

        match self.positions.get(&chunk.id) {
            Some(&i) => self.entries[i] = IndexEntry { chunk, vector },
            None => {
                self.positions.insert(chunk.id, self.entries.len());
                self.entries.push(IndexEntry { chunk, vector });
            }
        }
        Ok(())
    }

    /// Swaps a document's chunks for a new set. Every vector is checked before
    /// anything changes, so a failure leaves the index untouched.
    pub fn replace_document(&mut self, document_id: Uuid, entries: Vec<IndexEntry>) -> Result<()> {
        let mut dimension = self.dimension;
        for entry in &entries {
            if entry.chunk.document_id != document_id {
                return Err(IndexError::ForeignChunk {
                    chunk_id: entry.chunk.id,
                    document_id,
                });
            }
            let expected = *dimension.get_or_insert(entry.vector.len());
            if entry.vector.len() != expected || expected == 0 {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: entry.vector.len(),
                });
            }
        }

        let keep: std::collections::HashSet<Uuid> = entries.iter().map(|e| e.chunk.id).collect();
        self.entries
            .retain(|e| e.chunk.document_id != document_id || keep.contains(&e.chunk.id));
        self.rebuild_positions();
        if self.entries.is_empty() {
            self.dimension = None;
        }

        for entry in entries {
            self.add(entry.chunk, entry.vector)?;
        }
        Ok(())
    }

    /// Removes every chunk of a document. Returns how many were removed.
    pub fn remove_document(&mut self, document_id: Uuid) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.chunk.document_id != document_id);
        self.rebuild_positions();
        if self.entries.is_empty() {
            self.dimension = None;
        }
        before - self.entries.len()
    }

    /// Empties the index, including the embedding cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
        self.dimension = None;
        self.cache.clear();
    }

    /// Returns up to `k` entries by descending cosine similarity, ties broken
    /// by insertion order. An empty index returns no hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(expected) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                chunk: self.entries[i].chunk.clone(),
                score,
                ordinal: i,
            })
            .collect())
    }

    /// One summary per document, in order of first appearance.
    pub fn documents(&self) -> Vec<DocumentSummary> {
        let mut summaries: Vec<DocumentSummary> = Vec::new();
        let mut seen: HashMap<Uuid, usize> = HashMap::new();
        for entry in &self.entries {
            let chunk = &entry.chunk;
            match seen.get(&chunk.document_id) {
                Some(&i) => summaries[i].chunks += 1,
                None => {
                    seen.insert(chunk.document_id, summaries.len());
                    summaries.push(DocumentSummary {
                        document_id: chunk.document_id,
                        origin_filename: chunk.origin_filename.clone(),
                        source_type: chunk.source_type,
                        chunks: 1,
                    });
                }
            }
        }
        summaries
    }

    pub fn stats(&self) -> IndexStats {
        let mut by_source_type = BTreeMap::new();
        for entry in &self.entries {
            *by_source_type.entry(entry.chunk.source_type).or_insert(0) += 1;
        }
        IndexStats {
            chunks: self.entries.len(),
            documents: self.documents().len(),
            by_source_type,
            dimension: self.dimension,
            embedding_model: self.embedding_model.clone(),
            cached_embeddings: self.cache.len(),
        }
    }
}
