//! Content-hash keyed embedding cache.
//!
//! Keys are SHA-256 of the model id plus whitespace-normalised text, so
//! re-ingesting unchanged text skips the embedding call.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingCache {
    entries: BTreeMap<String, Vec<f32>>,
}

/// Collapses runs of whitespace and trims the ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn cache_key(model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_text(text).as_bytes());
    hex::encode(hasher.finalize())
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, model: &str, text: &str) -> Option<&Vec<f32>> {
        self.entries.get(&cache_key(model, text))
    }

    pub fn insert(&mut self, model: &str, text: &str, vector: Vec<f32>) {
        self.entries.insert(cache_key(model, text), vector);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops entries whose text is not in `live_texts`.
    pub fn retain_texts<'a>(&mut self, model: &str, live_texts: impl IntoIterator<Item = &'a str>) {
        let live: HashSet<String> = live_texts
            .into_iter()
            .map(|t| cache_key(model, t))
            .collect();
        self.entries.retain(|key, _| live.contains(key));
    }

    /// Vectors stored in the cache, for dimension checks on load.
    pub fn vectors(&self) -> impl Iterator<Item = &Vec<f32>> {
        self.entries.values()
    }
}
