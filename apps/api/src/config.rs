use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::embedding::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};
use crate::ingestion::chunker::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::models::document::SourceType;
use crate::retrieval::retriever::{DEFAULT_TOP_K, MAX_TOP_K, MIN_TOP_K};
use crate::retrieval::{DomainVocabulary, KeywordQueryMode};

/// Application configuration loaded from environment variables.
/// Every variable has a default; invalid values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub sources_dir: PathBuf,
    pub index_path: PathBuf,
    pub ollama_base_url: String,
    pub embedding_model: String,
    pub llm_model: String,
    pub chunking: ChunkingConfig,
    /// Already clamped to the supported range.
    pub retrieval_top_k: usize,
    pub enabled_source_types: BTreeSet<SourceType>,
    pub keyword_query_mode: KeywordQueryMode,
    /// Terms ranked ahead of generic words by the keyword extractor.
    pub domain_vocabulary: DomainVocabulary,
    pub embed_batch_size: usize,
    pub embed_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let chunk_size: usize = parse_env(&var("CHUNK_SIZE", &DEFAULT_CHUNK_SIZE.to_string()), "CHUNK_SIZE")?;
        let chunk_overlap: usize =
            parse_env(&var("CHUNK_OVERLAP", &DEFAULT_CHUNK_OVERLAP.to_string()), "CHUNK_OVERLAP")?;
        let chunking = ChunkingConfig::new(chunk_size, chunk_overlap)
            .context("CHUNK_SIZE / CHUNK_OVERLAP are inconsistent")?;

        let top_k: usize = parse_env(&var("RETRIEVAL_TOP_K", &DEFAULT_TOP_K.to_string()), "RETRIEVAL_TOP_K")?;

        let enabled_source_types = var("ENABLED_SOURCE_TYPES", "resume,experience,book")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<SourceType>()
                    .map_err(|e| anyhow::anyhow!("ENABLED_SOURCE_TYPES: {e}"))
            })
            .collect::<Result<BTreeSet<_>>>()?;
        if enabled_source_types.is_empty() {
            bail!("ENABLED_SOURCE_TYPES must name at least one source type");
        }

        let keyword_query_mode = var("KEYWORD_QUERY_MODE", "concatenated")
            .parse::<KeywordQueryMode>()
            .map_err(|e| anyhow::anyhow!("KEYWORD_QUERY_MODE: {e}"))?;

        // Unset keeps the built-in legislature list; "none" turns the bonus off.
        let domain_vocabulary = match lookup("DOMAIN_KEYWORDS")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            None => DomainVocabulary::default(),
            Some(v) if v.eq_ignore_ascii_case("none") => DomainVocabulary::none(),
            Some(v) => DomainVocabulary::new(v.split(',')),
        };

        let embed_batch_size: usize =
            parse_env(&var("EMBED_BATCH_SIZE", &DEFAULT_BATCH_SIZE.to_string()), "EMBED_BATCH_SIZE")?;
        let embed_concurrency: usize = parse_env(
            &var("EMBED_CONCURRENCY", &DEFAULT_CONCURRENCY.to_string()),
            "EMBED_CONCURRENCY",
        )?;
        if embed_batch_size == 0 || embed_concurrency == 0 {
            bail!("EMBED_BATCH_SIZE and EMBED_CONCURRENCY must be greater than zero");
        }

        Ok(Config {
            port: parse_env(&var("PORT", "8080"), "PORT")?,
            rust_log: var("RUST_LOG", "info"),
            sources_dir: PathBuf::from(var("SOURCES_DIR", "sources")),
            index_path: PathBuf::from(var("INDEX_PATH", "data/index.json")),
            ollama_base_url: var("OLLAMA_BASE_URL", "http://localhost:11434"),
            embedding_model: var("EMBEDDING_MODEL", "nomic-embed-text"),
            llm_model: var("LLM_MODEL", "llama3.2"),
            chunking,
            retrieval_top_k: top_k.clamp(MIN_TOP_K, MAX_TOP_K),
            enabled_source_types,
            keyword_query_mode,
            domain_vocabulary,
            embed_batch_size,
            embed_concurrency,
        })
    }
}

fn parse_env<T>(value: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a valid number, got '{value}'"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.chunking, ChunkingConfig::new(800, 100).unwrap());
        assert_eq!(config.retrieval_top_k, 12);
        assert_eq!(config.embedding_model, "nomic-embed-text");
        assert_eq!(config.llm_model, "llama3.2");
        assert_eq!(config.ollama_base_url, "http://localhost:11434");
        assert_eq!(config.enabled_source_types.len(), 3);
        assert_eq!(config.keyword_query_mode, KeywordQueryMode::Concatenated);
        assert_eq!(config.index_path, PathBuf::from("data/index.json"));
    }

    #[test]
    fn test_overlap_not_below_size_fails_startup() {
        let err = config_from(&[("CHUNK_SIZE", "100"), ("CHUNK_OVERLAP", "100")]).unwrap_err();
        assert!(format!("{err:#}").contains("CHUNK_OVERLAP"));
    }

    #[test]
    fn test_non_numeric_value_names_the_variable() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_top_k_is_clamped() {
        assert_eq!(config_from(&[("RETRIEVAL_TOP_K", "2")]).unwrap().retrieval_top_k, 5);
        assert_eq!(config_from(&[("RETRIEVAL_TOP_K", "99")]).unwrap().retrieval_top_k, 20);
    }

    #[test]
    fn test_domain_keywords() {
        assert_eq!(config_from(&[]).unwrap().domain_vocabulary, DomainVocabulary::default());
        assert!(config_from(&[("DOMAIN_KEYWORDS", "none")])
            .unwrap()
            .domain_vocabulary
            .is_empty());

        let custom = config_from(&[("DOMAIN_KEYWORDS", "Medi-Cal, health policy,,")])
            .unwrap()
            .domain_vocabulary;
        assert_eq!(custom.len(), 2);
        assert!(custom.contains("medi-cal"));
        assert!(!custom.contains("budget"));
    }

    #[test]
    fn test_source_types_and_mode() {
        let config = config_from(&[
            ("ENABLED_SOURCE_TYPES", "resumes, books"),
            ("KEYWORD_QUERY_MODE", "per_phrase"),
        ])
        .unwrap();
        assert_eq!(
            config.enabled_source_types,
            [SourceType::Resume, SourceType::Book].into_iter().collect::<BTreeSet<_>>()
        );
        assert_eq!(config.keyword_query_mode, KeywordQueryMode::PerPhrase);

        assert!(config_from(&[("ENABLED_SOURCE_TYPES", "novels")]).is_err());
        assert!(config_from(&[("ENABLED_SOURCE_TYPES", " , ")]).is_err());
        assert!(config_from(&[("KEYWORD_QUERY_MODE", "both")]).is_err());
    }
}
