//! Retriever: builds the ranked context set for prompt assembly.
//!
//! One semantic query (the whole job description) plus keyword-derived
//! queries run against the index. Candidates are merged by chunk id keeping
//! the highest score, filtered by source type, then sorted and truncated.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::keywords::{extract_keywords_with, DomainVocabulary, KeywordSet, DEFAULT_MAX_KEYWORDS};
use super::RetrievalError;
use crate::embedding::{check_batch, Embedder};
use crate::index::{SearchHit, VectorIndex};
use crate::models::document::{Chunk, SourceType};

pub const MIN_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 20;
pub const DEFAULT_TOP_K: usize = 12;

const OVERFETCH_FACTOR: usize = 2;
/// Used when part of the corpus is filtered out after the search.
const FILTERED_OVERFETCH_FACTOR: usize = 4;

/// Terms joined into the single keyword query.
const CONCATENATED_TERMS: usize = 10;
/// Terms embedded one by one in per-phrase mode.
const PER_PHRASE_TERMS: usize = 5;

/// How keyword terms become query vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordQueryMode {
    /// Top terms joined into one query.
    #[default]
    Concatenated,
    /// Each top term is its own query.
    PerPhrase,
}

impl std::str::FromStr for KeywordQueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "concatenated" => Ok(KeywordQueryMode::Concatenated),
            "per_phrase" => Ok(KeywordQueryMode::PerPhrase),
            other => Err(format!(
                "unknown keyword query mode '{other}' (expected concatenated or per_phrase)"
            )),
        }
    }
}

/// Which query found a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "path", content = "query", rename_all = "snake_case")]
pub enum QueryPath {
    Semantic,
    Keyword(String),
}

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Clamped to `MIN_TOP_K..=MAX_TOP_K`.
    pub top_k: usize,
    pub source_types: BTreeSet<SourceType>,
    pub keyword_mode: KeywordQueryMode,
    pub domain_vocabulary: DomainVocabulary,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            source_types: SourceType::ALL.into_iter().collect(),
            keyword_mode: KeywordQueryMode::default(),
            domain_vocabulary: DomainVocabulary::default(),
        }
    }
}

impl RetrievalOptions {
    pub fn final_count(&self) -> usize {
        self.top_k.clamp(MIN_TOP_K, MAX_TOP_K)
    }

    fn fetch_count(&self) -> usize {
        let filtered = SourceType::ALL
            .iter()
            .any(|t| !self.source_types.contains(t));
        let factor = if filtered {
            FILTERED_OVERFETCH_FACTOR
        } else {
            OVERFETCH_FACTOR
        };
        self.final_count() * factor
    }
}

/// A chunk with its merged relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub matched_by: Vec<QueryPath>,
    #[serde(skip)]
    ordinal: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
    pub keywords: KeywordSet,
    /// Number of query vectors searched.
    pub query_count: usize,
}

/// Builds the keyword query texts for a mode.
pub fn keyword_queries(keywords: &KeywordSet, mode: KeywordQueryMode) -> Vec<String> {
    if keywords.is_empty() {
        return Vec::new();
    }
    match mode {
        KeywordQueryMode::Concatenated => vec![keywords
            .top(CONCATENATED_TERMS)
            .iter()
            .map(|e| e.keyword.as_str())
            .collect::<Vec<_>>()
            .join(" ")],
        KeywordQueryMode::PerPhrase => keywords
            .top(PER_PHRASE_TERMS)
            .iter()
            .map(|e| e.keyword.clone())
            .collect(),
    }
}

/// Merges per-query hit lists. Each chunk id appears once with its highest
/// score; every path that found it is kept. Ordered by score descending,
/// then insertion order.
pub fn merge_hits(per_query: Vec<(QueryPath, Vec<SearchHit>)>) -> Vec<ScoredChunk> {
    let mut merged: HashMap<Uuid, ScoredChunk> = HashMap::new();
    for (path, hits) in per_query {
        for hit in hits {
            match merged.get_mut(&hit.chunk.id) {
                Some(existing) => {
                    existing.score = existing.score.max(hit.score);
                    if !existing.matched_by.contains(&path) {
                        existing.matched_by.push(path.clone());
                    }
                }
                None => {
                    merged.insert(
                        hit.chunk.id,
                        ScoredChunk {
                            chunk: hit.chunk,
                            score: hit.score,
                            matched_by: vec![path.clone()],
                            ordinal: hit.ordinal,
                        },
                    );
                }
            }
        }
    }

    let mut out: Vec<ScoredChunk> = merged.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.ordinal.cmp(&b.ordinal))
    });
    out
}

/// Read-only view over an index plus the embedder that produced it.
pub struct Retriever<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a VectorIndex, embedder: &'a dyn Embedder) -> Self {
        Self { index, embedder }
    }

    /// Runs semantic plus keyword retrieval for a job description.
    ///
    /// An index with no chunks is `IndexNotBuilt`. A blank job description
    /// against a built index gives an empty result without embedding anything.
    pub async fn retrieve(
        &self,
        job_description: &str,
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult, RetrievalError> {
        if self.index.is_empty() {
            return Err(RetrievalError::IndexNotBuilt);
        }
        if let Some(indexed) = self.index.embedding_model() {
            if indexed != self.embedder.model() {
                return Err(RetrievalError::ModelMismatch {
                    indexed: indexed.to_string(),
                    configured: self.embedder.model().to_string(),
                });
            }
        }
        if job_description.trim().is_empty() {
            debug!("Blank job description, returning empty context");
            return Ok(RetrievalResult::default());
        }

        let keywords = extract_keywords_with(
            job_description,
            DEFAULT_MAX_KEYWORDS,
            &options.domain_vocabulary,
        );
        let mut paths = vec![QueryPath::Semantic];
        let mut texts = vec![job_description.to_string()];
        for query in keyword_queries(&keywords, options.keyword_mode) {
            paths.push(QueryPath::Keyword(query.clone()));
            texts.push(query);
        }

        let vectors = self.embedder.embed(&texts).await?;
        check_batch(texts.len(), &vectors)?;

        let fetch = options.fetch_count();
        let mut per_query = Vec::with_capacity(paths.len());
        for (path, vector) in paths.into_iter().zip(&vectors) {
            per_query.push((path, self.index.search(vector, fetch)?));
        }

        let candidates = merge_hits(per_query);
        let candidate_count = candidates.len();
        let mut chunks: Vec<ScoredChunk> = candidates
            .into_iter()
            .filter(|c| options.source_types.contains(&c.chunk.source_type))
            .collect();
        chunks.truncate(options.final_count());

        if chunks.is_empty() {
            warn!("No chunks matched the enabled source types {:?}", options.source_types);
        }
        info!(
            "Retrieved {} chunks ({} keywords, {} queries, {} candidates)",
            chunks.len(),
            keywords.len(),
            texts.len(),
            candidate_count
        );

        Ok(RetrievalResult {
            chunks,
            keywords,
            query_count: texts.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::embedding::testing::FakeEmbedder;
    use crate::index::IndexEntry;
    use crate::models::document::{chunk_id, document_id};
    use crate::retrieval::extract_keywords;

    const VOCAB: &[&str] = &["policy", "budget", "casework", "rust", "hearing"];

    fn chunk(file: &str, position: u32, source_type: SourceType, text: &str) -> Chunk {
        let doc = document_id(file);
        Chunk {
            id: chunk_id(doc, position),
            document_id: doc,
            source_type,
            origin_filename: file.to_string(),
            text: text.to_string(),
            position_index: position,
            start_char: 0,
            end_char: text.chars().count(),
        }
    }

    fn build_index(embedder: &FakeEmbedder, chunks: Vec<Chunk>) -> VectorIndex {
        let mut index = VectorIndex::new();
        for c in chunks {
            let vector = embedder.vector_for(&c.text);
            index.add(c, vector).unwrap();
        }
        index.set_embedding_model(embedder.model());
        index
    }

    fn hit(c: &Chunk, score: f32, ordinal: usize) -> SearchHit {
        SearchHit {
            chunk: c.clone(),
            score,
            ordinal,
        }
    }

    #[test]
    fn test_merge_keeps_max_score_once() {
        let a = chunk("resumes/a.txt", 0, SourceType::Resume, "policy");
        let b = chunk("resumes/a.txt", 1, SourceType::Resume, "budget");
        let merged = merge_hits(vec![
            (QueryPath::Semantic, vec![hit(&a, 0.4, 0), hit(&b, 0.7, 1)]),
            (
                QueryPath::Keyword("policy".into()),
                vec![hit(&a, 0.9, 0)],
            ),
        ]);

        assert_eq!(merged.len(), 2, "no duplicate chunk ids");
        assert_eq!(merged[0].chunk.id, a.id);
        assert!((merged[0].score - 0.9).abs() < f32::EPSILON, "max of both paths");
        assert_eq!(
            merged[0].matched_by,
            vec![QueryPath::Semantic, QueryPath::Keyword("policy".into())]
        );
        assert_eq!(merged[1].chunk.id, b.id);
    }

    #[test]
    fn test_merge_breaks_ties_by_insertion_order() {
        let a = chunk("books/x.md", 0, SourceType::Book, "one");
        let b = chunk("books/x.md", 1, SourceType::Book, "two");
        let merged = merge_hits(vec![(QueryPath::Semantic, vec![hit(&b, 0.5, 1), hit(&a, 0.5, 0)])]);
        assert_eq!(merged[0].chunk.id, a.id);
    }

    #[test]
    fn test_top_k_is_clamped() {
        let mut options = RetrievalOptions {
            top_k: 1,
            ..RetrievalOptions::default()
        };
        assert_eq!(options.final_count(), MIN_TOP_K);
        options.top_k = 50;
        assert_eq!(options.final_count(), MAX_TOP_K);
        assert_eq!(options.fetch_count(), MAX_TOP_K * 2);
        options.source_types = [SourceType::Resume].into_iter().collect();
        assert_eq!(options.fetch_count(), MAX_TOP_K * 4);
    }

    #[test]
    fn test_keyword_query_modes() {
        let keywords = extract_keywords("Budget Analyst\nPolicy and budget casework", 25);
        let concatenated = keyword_queries(&keywords, KeywordQueryMode::Concatenated);
        assert_eq!(concatenated.len(), 1);
        assert!(concatenated[0].contains("budget"));

        let per_phrase = keyword_queries(&keywords, KeywordQueryMode::PerPhrase);
        assert_eq!(per_phrase.len(), PER_PHRASE_TERMS.min(keywords.len()));
        assert!(keyword_queries(&KeywordSet::default(), KeywordQueryMode::PerPhrase).is_empty());
    }

    #[test]
    fn test_mode_parses_from_config_strings() {
        assert_eq!("per-phrase".parse::<KeywordQueryMode>().unwrap(), KeywordQueryMode::PerPhrase);
        assert_eq!("Concatenated".parse::<KeywordQueryMode>().unwrap(), KeywordQueryMode::Concatenated);
        assert!("both".parse::<KeywordQueryMode>().is_err());
    }

    #[tokio::test]
    async fn test_top_five_on_three_chunks_returns_all_three() {
        let embedder = FakeEmbedder::new(VOCAB);
        let index = build_index(
            &embedder,
            vec![
                chunk("resumes/a.txt", 0, SourceType::Resume, "policy casework"),
                chunk("experiences/b.md", 0, SourceType::Experience, "budget hearing"),
                chunk("books/c.md", 0, SourceType::Book, "rust"),
            ],
        );
        let options = RetrievalOptions {
            top_k: 5,
            ..RetrievalOptions::default()
        };

        let result = Retriever::new(&index, &embedder)
            .retrieve("Policy analyst for budget hearings", &options)
            .await
            .unwrap();

        assert_eq!(result.chunks.len(), 3);
        let mut ids: Vec<Uuid> = result.chunks.iter().map(|c| c.chunk.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        for pair in result.chunks.windows(2) {
            assert!(pair[0].score >= pair[1].score, "sorted by score");
        }
    }

    #[tokio::test]
    async fn test_chunk_found_by_both_paths_appears_once_with_max_score() {
        let embedder = FakeEmbedder::new(VOCAB);
        let target = chunk("resumes/a.txt", 0, SourceType::Resume, "policy budget");
        let index = build_index(
            &embedder,
            vec![
                target.clone(),
                chunk("resumes/a.txt", 1, SourceType::Resume, "rust"),
            ],
        );

        let jd = "policy budget hearing";
        let result = Retriever::new(&index, &embedder)
            .retrieve(jd, &RetrievalOptions::default())
            .await
            .unwrap();

        let found: Vec<&ScoredChunk> = result
            .chunks
            .iter()
            .filter(|c| c.chunk.id == target.id)
            .collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].matched_by.len() >= 2, "semantic and keyword paths");

        let semantic = crate::index::cosine_similarity(
            &embedder.vector_for(jd),
            &embedder.vector_for(&target.text),
        );
        assert!(found[0].score >= semantic);
    }

    #[tokio::test]
    async fn test_empty_index_is_not_built() {
        let embedder = FakeEmbedder::new(VOCAB);
        let index = VectorIndex::new();
        let err = Retriever::new(&index, &embedder)
            .retrieve("Policy analyst", &RetrievalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::IndexNotBuilt));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

        // Distinct from a plain search, which is just empty.
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_job_description_returns_empty_result() {
        let embedder = FakeEmbedder::new(VOCAB);
        let index = build_index(
            &embedder,
            vec![chunk("resumes/a.txt", 0, SourceType::Resume, "policy")],
        );

        let result = Retriever::new(&index, &embedder)
            .retrieve("   \n", &RetrievalOptions::default())
            .await
            .unwrap();
        assert!(result.chunks.is_empty());
        assert!(result.keywords.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_source_type_filter() {
        let embedder = FakeEmbedder::new(VOCAB);
        let index = build_index(
            &embedder,
            vec![
                chunk("resumes/a.txt", 0, SourceType::Resume, "policy"),
                chunk("books/b.md", 0, SourceType::Book, "policy budget"),
                chunk("experiences/c.md", 0, SourceType::Experience, "policy casework"),
            ],
        );
        let options = RetrievalOptions {
            source_types: [SourceType::Resume, SourceType::Experience]
                .into_iter()
                .collect(),
            ..RetrievalOptions::default()
        };

        let result = Retriever::new(&index, &embedder)
            .retrieve("policy", &options)
            .await
            .unwrap();
        assert_eq!(result.chunks.len(), 2);
        assert!(result
            .chunks
            .iter()
            .all(|c| c.chunk.source_type != SourceType::Book));
    }

    #[tokio::test]
    async fn test_per_phrase_mode_issues_one_call_with_several_queries() {
        let embedder = FakeEmbedder::new(VOCAB);
        let index = build_index(
            &embedder,
            vec![chunk("resumes/a.txt", 0, SourceType::Resume, "policy")],
        );
        let options = RetrievalOptions {
            keyword_mode: KeywordQueryMode::PerPhrase,
            ..RetrievalOptions::default()
        };

        let result = Retriever::new(&index, &embedder)
            .retrieve("Budget Analyst\nPolicy casework and budget hearings", &options)
            .await
            .unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.query_count, 1 + PER_PHRASE_TERMS);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_surfaced() {
        let good = FakeEmbedder::new(VOCAB);
        let index = build_index(
            &good,
            vec![chunk("resumes/a.txt", 0, SourceType::Resume, "policy")],
        );
        let failing = FakeEmbedder::failing();
        let err = Retriever::new(&index, &failing)
            .retrieve("policy", &RetrievalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
    }
}
