//! Keyword Extractor: pulls a ranked set of salient terms and short phrases
//! out of a job description. Deterministic and LLM-free.
//!
//! Each occurrence contributes the weight of the line it sits on:
//! title=1.0, requirements=0.8, responsibilities=0.6, body=0.5, about=0.3.
//! Terms seen capitalized mid-line (or as acronyms) get a 1.5x bonus, and
//! multi-word phrases get +25% per extra word. Terms from the domain
//! vocabulary are doubled on top, so they lead the ranking.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_KEYWORDS: usize = 25;

/// Leading non-empty lines treated as the job title.
const TITLE_LINES: usize = 2;
const MAX_PHRASE_WORDS: usize = 3;
/// Longest line still considered a section header.
const MAX_HEADER_WORDS: usize = 6;
const CAPITALIZED_MULTIPLIER: f32 = 1.5;
const PHRASE_WORD_BONUS: f32 = 0.25;
const DOMAIN_MULTIPLIER: f32 = 2.0;

/// Legislature and public-policy terms boosted when no vocabulary is configured.
pub const DEFAULT_DOMAIN_TERMS: &[&str] = &[
    "legislative", "constituent", "policy", "committee", "hearing", "briefing", "assembly",
    "senate", "district", "campaign", "constituency", "bill", "amendment", "stakeholder",
    "appropriations", "budget", "analysis", "communications", "outreach", "scheduling",
    "correspondence",
];

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "etc", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "may",
    "me", "might", "more", "most", "must", "my", "no", "nor", "not", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "out", "over", "own", "per", "same", "shall", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "upon", "us", "very", "via", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "within", "would", "you", "your", "yours",
    // Job-posting filler.
    "ability", "able", "apply", "candidate", "candidates", "duties", "including", "job",
    "looking", "plus", "position", "preferred", "qualifications", "required", "requirements",
    "responsibilities", "role", "seeking", "strong", "summary", "year", "years",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Body,
    Requirements,
    Responsibilities,
    About,
}

impl Section {
    fn weight(self, is_bullet: bool) -> f32 {
        match self {
            Section::Requirements => 0.8,
            Section::Responsibilities => 0.6,
            Section::About => 0.3,
            // Bare bullet lists in an unlabelled posting are usually requirements.
            Section::Body if is_bullet => 0.8,
            Section::Body => 0.5,
        }
    }
}

const TITLE_WEIGHT: f32 = 1.0;

/// A single keyword from the job description, weighted by position and frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub frequency: u32,
    /// Highest line weight among the occurrences.
    pub position_weight: f32,
    pub weighted_score: f32,
}

/// Keywords ranked by descending `weighted_score`. Case-insensitively unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordSet {
    entries: Vec<KeywordEntry>,
}

impl KeywordSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[KeywordEntry] {
        &self.entries
    }

    pub fn top(&self, n: usize) -> &[KeywordEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn get(&self, keyword: &str) -> Option<&KeywordEntry> {
        let key = keyword.to_lowercase();
        self.entries.iter().find(|e| e.keyword == key)
    }
}

/// Terms (or phrases) that rank ahead of generic words of equal weight.
/// Stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainVocabulary {
    terms: BTreeSet<String>,
}

impl DomainVocabulary {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn none() -> Self {
        Self {
            terms: BTreeSet::new(),
        }
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.terms.contains(keyword)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for DomainVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN_TERMS)
    }
}

fn default_vocabulary() -> &'static DomainVocabulary {
    static DEFAULT: OnceLock<DomainVocabulary> = OnceLock::new();
    DEFAULT.get_or_init(DomainVocabulary::default)
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    // Keeps C++, C#, Node.js, CI/CD, front-end as single tokens.
    TOKEN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9][A-Za-z0-9+#]*(?:[./\-'][A-Za-z0-9+#]+)*")
            .expect("valid token pattern")
    })
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    /// First token of its line.
    line_start: bool,
}

impl Token<'_> {
    fn is_acronym(&self) -> bool {
        self.text.len() >= 2
            && self.text.chars().any(|c| c.is_ascii_alphabetic())
            && !self.text.chars().any(|c| c.is_lowercase())
    }

    fn is_capitalized(&self) -> bool {
        self.text.chars().next().is_some_and(char::is_uppercase)
    }

    /// Whether the token can stand on its own as a keyword.
    fn is_candidate(&self) -> bool {
        let lower = self.text.to_lowercase();
        if is_stop_word(&lower) || lower.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        lower.chars().count() >= 3 || lower.contains(['+', '#']) || self.is_acronym()
    }
}

/// Splits a line into segments of adjacent tokens. Any punctuation between
/// two tokens ends a segment.
fn segments(line: &str) -> Vec<Vec<Token<'_>>> {
    let mut out: Vec<Vec<Token<'_>>> = Vec::new();
    let mut current: Vec<Token<'_>> = Vec::new();
    let mut last_end = 0;
    let mut first = true;

    for m in token_regex().find_iter(line) {
        let gap = &line[last_end..m.start()];
        if !first && !gap.trim().is_empty() && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        current.push(Token {
            text: m.as_str(),
            line_start: first,
        });
        first = false;
        last_end = m.end();
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn is_bullet(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(['-', '*', '•', '–', '·'])
        || trimmed
            .split_once(['.', ')'])
            .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Header titles recognised without a `:` or `#` marker. Matched against the
/// whole cleaned line.
const HEADER_TITLES: &[(&str, Section)] = &[
    ("requirements", Section::Requirements),
    ("minimum requirements", Section::Requirements),
    ("qualifications", Section::Requirements),
    ("minimum qualifications", Section::Requirements),
    ("desirable qualifications", Section::Requirements),
    ("desired qualifications", Section::Requirements),
    ("preferred qualifications", Section::Requirements),
    ("skills", Section::Requirements),
    ("required skills", Section::Requirements),
    ("skills and experience", Section::Requirements),
    ("what you bring", Section::Requirements),
    ("what you'll bring", Section::Requirements),
    ("nice to have", Section::Requirements),
    ("responsibilities", Section::Responsibilities),
    ("key responsibilities", Section::Responsibilities),
    ("duties", Section::Responsibilities),
    ("essential duties", Section::Responsibilities),
    ("essential functions", Section::Responsibilities),
    ("what you'll do", Section::Responsibilities),
    ("what you will do", Section::Responsibilities),
    ("the role", Section::Responsibilities),
    ("about", Section::About),
    ("benefits", Section::About),
    ("perks", Section::About),
    ("compensation", Section::About),
    ("how to apply", Section::About),
];

/// Unmarked headers that may carry a short qualifier ("About the Office").
const QUALIFIED_ABOUT_TITLES: &[&str] = &["about", "benefits", "compensation"];
const MAX_QUALIFIED_HEADER_WORDS: usize = 3;

/// Section named by a marked header line (`Qualifications:`, `## Duties`).
fn classify_marked(cleaned: &str) -> Option<Section> {
    const REQUIREMENTS: &[&str] = &[
        "requirement", "qualification", "skills", "what you bring", "you have", "must have",
        "nice to have", "preferred", "desired",
    ];
    const RESPONSIBILITIES: &[&str] = &[
        "responsibilit", "duties", "what you'll do", "what you will do", "the role", "you will",
        "day to day",
    ];
    const ABOUT: &[&str] = &[
        "about", "benefits", "perks", "who we are", "compensation", "salary", "equal opportunity",
        "how to apply",
    ];

    let has = |needles: &[&str]| needles.iter().any(|n| cleaned.contains(n));
    if has(REQUIREMENTS) {
        Some(Section::Requirements)
    } else if has(RESPONSIBILITIES) {
        Some(Section::Responsibilities)
    } else if has(ABOUT) {
        Some(Section::About)
    } else {
        None
    }
}

/// Recognises section header lines and returns the section they open.
///
/// A line is a header when it is marked (ends with `:` or starts with `#`)
/// or is itself a known header title. Bullets are always content.
fn header_section(line: &str) -> Option<Section> {
    if is_bullet(line) {
        return None;
    }
    let cleaned = line
        .trim()
        .trim_matches(|c: char| c == '#' || c == '*' || c == ':' || c.is_whitespace())
        .to_lowercase();
    let words = cleaned.split_whitespace().count();
    if cleaned.is_empty() || words > MAX_HEADER_WORDS {
        return None;
    }

    if line.trim_end().ends_with(':') || line.trim_start().starts_with('#') {
        return classify_marked(&cleaned);
    }
    if let Some((_, section)) = HEADER_TITLES.iter().find(|(title, _)| cleaned == *title) {
        return Some(*section);
    }
    let qualified = words <= MAX_QUALIFIED_HEADER_WORDS
        && QUALIFIED_ABOUT_TITLES.iter().any(|title| {
            cleaned
                .strip_prefix(title)
                .is_some_and(|rest| rest.starts_with(' '))
        });
    qualified.then_some(Section::About)
}

#[derive(Debug, Default)]
struct Tally {
    frequency: u32,
    score: f32,
    position_weight: f32,
    capitalized: bool,
    in_title: bool,
    words: usize,
    first_seen: usize,
}

/// Extracts up to `max_keywords` ranked terms and phrases with the default
/// domain vocabulary.
pub fn extract_keywords(text: &str, max_keywords: usize) -> KeywordSet {
    extract_keywords_with(text, max_keywords, default_vocabulary())
}

/// Extracts up to `max_keywords` ranked terms and phrases. Empty or
/// whitespace-only input gives an empty set.
pub fn extract_keywords_with(
    text: &str,
    max_keywords: usize,
    vocabulary: &DomainVocabulary,
) -> KeywordSet {
    if text.trim().is_empty() || max_keywords == 0 {
        return KeywordSet::default();
    }

    let mut tallies: HashMap<String, Tally> = HashMap::new();
    let mut order = 0usize;
    let mut section = Section::Body;
    let mut title_lines_seen = 0usize;

    let mut record = |key: String, weight: f32, capitalized: bool, in_title: bool, words: usize| {
        let tally = tallies.entry(key).or_insert_with(|| Tally {
            words,
            first_seen: order,
            ..Tally::default()
        });
        order += 1;
        tally.frequency += 1;
        tally.score += weight;
        tally.position_weight = tally.position_weight.max(weight);
        tally.capitalized |= capitalized;
        tally.in_title |= in_title;
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let in_title = title_lines_seen < TITLE_LINES;
        if in_title {
            title_lines_seen += 1;
        } else if let Some(next) = header_section(line) {
            section = next;
            continue;
        }

        let weight = if in_title {
            TITLE_WEIGHT
        } else {
            section.weight(is_bullet(line))
        };

        for segment in segments(line) {
            for token in &segment {
                if token.is_candidate() {
                    let capitalized =
                        token.is_acronym() || (token.is_capitalized() && !token.line_start);
                    record(token.text.to_lowercase(), weight, capitalized, in_title, 1);
                }
            }

            // Phrases: runs of non-stop-words, 2..=MAX_PHRASE_WORDS long.
            for run in segment
                .split(|t| is_stop_word(&t.text.to_lowercase()))
                .filter(|r| r.len() >= 2)
            {
                for n in 2..=MAX_PHRASE_WORDS.min(run.len()) {
                    for window in run.windows(n) {
                        let key = window
                            .iter()
                            .map(|t| t.text.to_lowercase())
                            .collect::<Vec<_>>()
                            .join(" ");
                        let capitalized = window.iter().all(|t| t.is_capitalized() || t.is_acronym());
                        record(key, weight, capitalized, in_title, n);
                    }
                }
            }
        }
    }

    let mut entries: Vec<(usize, KeywordEntry)> = tallies
        .into_iter()
        .filter(|(keyword, t)| {
            t.words == 1
                || t.frequency >= 2
                || t.capitalized
                || t.in_title
                || vocabulary.contains(keyword)
        })
        .map(|(keyword, t)| {
            let mut weighted_score = t.score;
            if t.capitalized {
                weighted_score *= CAPITALIZED_MULTIPLIER;
            }
            if vocabulary.contains(&keyword) {
                weighted_score *= DOMAIN_MULTIPLIER;
            }
            weighted_score *= 1.0 + PHRASE_WORD_BONUS * (t.words - 1) as f32;
            (
                t.first_seen,
                KeywordEntry {
                    keyword,
                    frequency: t.frequency,
                    position_weight: t.position_weight,
                    weighted_score,
                },
            )
        })
        .collect();

    entries.sort_by(|(a_seen, a), (b_seen, b)| {
        b.weighted_score
            .partial_cmp(&a.weighted_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a_seen.cmp(b_seen))
    });
    entries.truncate(max_keywords);

    KeywordSet {
        entries: entries.into_iter().map(|(_, e)| e).collect(),
    }
}
