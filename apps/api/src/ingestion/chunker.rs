//! Chunker: splits document text into overlapping passages.
//!
//! Sizes are counted in characters. Each chunk ends on a line break or
//! whitespace near the target size when one exists within the tolerance
//! window, otherwise it is cut hard. Consecutive chunks share `overlap`
//! characters, so every character of the input lands in at least one chunk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::document::{chunk_id, Chunk, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

#[derive(Debug, Error, PartialEq)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    InvalidSize,

    #[error("chunk overlap must be > 0 and < chunk size (size {size}, overlap {overlap})")]
    InvalidOverlap { size: usize, overlap: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    /// Builds a validated config. Invalid parameters are rejected before any
    /// text is touched.
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkError> {
        let config = Self { size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.size == 0 {
            return Err(ChunkError::InvalidSize);
        }
        if self.overlap == 0 || self.overlap >= self.size {
            return Err(ChunkError::InvalidOverlap {
                size: self.size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// How far back from the hard target we look for a break.
    fn tolerance(&self) -> usize {
        (self.size / 5).max(1)
    }
}

/// A borrowed slice of the input with its character range (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSpan<'a> {
    pub text: &'a str,
    pub start_char: usize,
    pub end_char: usize,
}

/// Lazy iterator over the chunk spans of one text.
pub struct TextChunks<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    config: ChunkingConfig,
    start: usize,
    done: bool,
}

/// Splits `text` into overlapping spans. Empty text yields no spans.
pub fn chunk_text<'a>(text: &'a str, config: &ChunkingConfig) -> Result<TextChunks<'a>, ChunkError> {
    config.validate()?;
    Ok(TextChunks {
        text,
        chars: text.char_indices().collect(),
        config: *config,
        start: 0,
        done: text.is_empty(),
    })
}

impl<'a> TextChunks<'a> {
    fn byte_offset(&self, char_index: usize) -> usize {
        self.chars
            .get(char_index)
            .map(|(b, _)| *b)
            .unwrap_or(self.text.len())
    }

    /// Picks the end of the chunk starting at `self.start`.
    fn find_end(&self) -> usize {
        let n = self.chars.len();
        let hard_end = (self.start + self.config.size).min(n);
        if hard_end == n {
            return n;
        }

        // Never pull the end back so far that the next chunk would not advance.
        let lo = (self.start + self.config.overlap + 1)
            .max(hard_end.saturating_sub(self.config.tolerance()));

        let break_after = |pred: fn(char) -> bool| {
            (lo..=hard_end).rev().find(|&p| pred(self.chars[p - 1].1))
        };

        break_after(|c| c == '\n')
            .or_else(|| break_after(char::is_whitespace))
            .unwrap_or(hard_end)
    }
}

impl<'a> Iterator for TextChunks<'a> {
    type Item = TextSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = self.start;
        let end = self.find_end();
        let span = TextSpan {
            text: &self.text[self.byte_offset(start)..self.byte_offset(end)],
            start_char: start,
            end_char: end,
        };

        if end >= self.chars.len() {
            self.done = true;
        } else {
            self.start = end - self.config.overlap;
        }

        Some(span)
    }
}

/// Chunks a document into `Chunk` records tagged with its source type and origin.
pub fn chunk_document<'a>(
    document: &'a Document,
    config: &ChunkingConfig,
) -> Result<impl Iterator<Item = Chunk> + 'a, ChunkError> {
    let spans = chunk_text(&document.raw_text, config)?;
    Ok(spans.enumerate().map(move |(i, span)| {
        let position_index = i as u32;
        Chunk {
            id: chunk_id(document.id, position_index),
            document_id: document.id,
            source_type: document.source_type,
            origin_filename: document.origin_filename.clone(),
            text: span.text.to_string(),
            position_index,
            start_char: span.start_char,
            end_char: span.end_char,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::SourceType;

    const RESUME: &str = "Jane Doe\nLegislative Aide, Office of the Assemblymember\n\n\
        Drafted bill analyses for the Appropriations Committee and briefed the member \
        before each hearing. Managed constituent correspondence and casework across the \
        district, and coordinated stakeholder outreach for budget requests.\n\n\
        Skills: policy analysis, scheduling, communications, public speaking.";

    fn assert_covers(text: &str, spans: &[TextSpan<'_>]) {
        let n = text.chars().count();
        let mut covered = vec![false; n];
        for span in spans {
            for c in covered.iter_mut().take(span.end_char).skip(span.start_char) {
                *c = true;
            }
        }
        assert!(covered.iter().all(|c| *c), "gap in coverage");
    }

    #[test]
    fn test_overlap_equal_to_size_is_rejected() {
        assert_eq!(
            ChunkingConfig::new(100, 100),
            Err(ChunkError::InvalidOverlap {
                size: 100,
                overlap: 100
            })
        );
    }

    #[test]
    fn test_overlap_larger_than_size_is_rejected_before_chunking() {
        let config = ChunkingConfig {
            size: 50,
            overlap: 80,
        };
        assert!(chunk_text(RESUME, &config).is_err());
    }

    #[test]
    fn test_zero_overlap_is_rejected() {
        assert!(ChunkingConfig::new(100, 0).is_err());
        assert_eq!(ChunkingConfig::new(0, 0), Err(ChunkError::InvalidSize));
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let config = ChunkingConfig::default();
        assert_eq!(chunk_text("", &config).unwrap().count(), 0);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let config = ChunkingConfig::default();
        let spans: Vec<_> = chunk_text("Policy analyst.", &config).unwrap().collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Policy analyst.");
        assert_eq!((spans[0].start_char, spans[0].end_char), (0, 15));
    }

    #[test]
    fn test_spans_cover_every_character() {
        for (size, overlap) in [(40, 10), (64, 1), (100, 99), (7, 3), (300, 50)] {
            let config = ChunkingConfig::new(size, overlap).unwrap();
            let spans: Vec<_> = chunk_text(RESUME, &config).unwrap().collect();
            assert_covers(RESUME, &spans);
            assert!(spans.iter().all(|s| s.end_char - s.start_char <= size));
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let config = ChunkingConfig::new(60, 15).unwrap();
        let spans: Vec<_> = chunk_text(RESUME, &config).unwrap().collect();
        assert!(spans.len() > 2);
        for pair in spans.windows(2) {
            assert_eq!(pair[1].start_char, pair[0].end_char - 15);
        }
    }

    #[test]
    fn test_prefers_whitespace_boundary() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let config = ChunkingConfig::new(20, 5).unwrap();
        let spans: Vec<_> = chunk_text(text, &config).unwrap().collect();
        let last = spans.len() - 1;
        for span in &spans[..last] {
            assert!(
                span.text.ends_with(' '),
                "chunk {:?} should end after whitespace",
                span.text
            );
        }
    }

    #[test]
    fn test_hard_cut_without_whitespace() {
        let text = "x".repeat(250);
        let config = ChunkingConfig::new(100, 10).unwrap();
        let spans: Vec<_> = chunk_text(&text, &config).unwrap().collect();
        assert_eq!(spans[0].end_char, 100);
        assert_eq!(spans[1].start_char, 90);
        assert_covers(&text, &spans);
    }

    #[test]
    fn test_multibyte_text_is_sliced_on_char_boundaries() {
        let text = "résumé — café naïveté ".repeat(20);
        let config = ChunkingConfig::new(30, 8).unwrap();
        let spans: Vec<_> = chunk_text(&text, &config).unwrap().collect();
        assert_covers(&text, &spans);
        for span in &spans {
            assert_eq!(span.text.chars().count(), span.end_char - span.start_char);
        }
    }

    #[test]
    fn test_chunk_document_tags_source_and_positions() {
        let doc = Document::new(SourceType::Resume, "resumes/jane.txt", RESUME.to_string());
        let config = ChunkingConfig::new(120, 20).unwrap();
        let chunks: Vec<_> = chunk_document(&doc, &config).unwrap().collect();
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position_index, i as u32);
            assert_eq!(chunk.document_id, doc.id);
            assert_eq!(chunk.source_type, SourceType::Resume);
            assert_eq!(chunk.origin_filename, "resumes/jane.txt");
        }
        let again: Vec<_> = chunk_document(&doc, &config).unwrap().collect();
        assert_eq!(chunks, again, "chunking is deterministic");
    }
}
