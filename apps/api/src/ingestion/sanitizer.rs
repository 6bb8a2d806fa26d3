//! Resume sanitizer: strips model commentary and application-specific
//! framing from previously generated resumes before they are chunked.

use std::sync::OnceLock;

use regex::{Regex, RegexSet};

/// Everything from one of these headers onward is commentary, not resume.
const CUT_SECTION_HEADERS: &[&str] = &[
    r"(?i)^\s*\*{0,2}\s*Changes Made\s*:?\s*\*{0,2}\s*$",
    r"(?i)^\s*\*{0,2}\s*Workspace Suggestions\s*:?\s*\*{0,2}\s*$",
];

const DROP_LINE_PATTERNS: &[&str] = &[
    r"(?i)^\s*Based on the provided resume\b.*$",
    r"(?i)^\s*Here is (an?|the)\b.*(resume|cover letter)\b.*$",
    r"(?i)^\s*I've made the necessary changes\b.*$",
    r"(?i)^\s*Here's the optimized resume\b.*$",
    r"(?i)^\s*This (directory|file) contains\b.*$",
    r"(?i)^\s*I am excited to apply for\b.*$",
    r"(?i)^\s*I am applying for\b.*$",
    r"(?i)^\s*optimized (it|resume)\b.*\b(Office of|Assemblymember|Senator)\b.*$",
];

const SECTION_START_HINTS: &[&str] = &[
    r"(?i)^\s*(\*\*)?(Summary|Experience|Education|Skills)(\*\*)?\s*:\s*(\*\*)?\s*$",
];

/// How many leading lines are scanned for the start of the resume body.
const PREAMBLE_SCAN_LINES: usize = 60;

struct Patterns {
    cut: RegexSet,
    drop: RegexSet,
    section: RegexSet,
    bold_name: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        cut: RegexSet::new(CUT_SECTION_HEADERS).expect("valid cut patterns"),
        drop: RegexSet::new(DROP_LINE_PATTERNS).expect("valid drop patterns"),
        section: RegexSet::new(SECTION_START_HINTS).expect("valid section patterns"),
        bold_name: Regex::new(r"^\s*\*\*[^*]{3,}\*\*\s*$").expect("valid bold-name pattern"),
    })
}

/// Returns resume text with meta sections, preamble lines and excess blank
/// lines removed.
pub fn sanitize_resume_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let p = patterns();

    let kept: Vec<&str> = text
        .lines()
        .take_while(|line| !p.cut.is_match(line))
        .filter(|line| !p.drop.is_match(line))
        .collect();

    let start = kept
        .iter()
        .take(PREAMBLE_SCAN_LINES)
        .enumerate()
        .find_map(|(i, line)| {
            if p.section.is_match(line) {
                Some(i.saturating_sub(2))
            } else if p.bold_name.is_match(line) {
                Some(i)
            } else {
                None
            }
        })
        .unwrap_or(0);

    let mut out: Vec<&str> = Vec::with_capacity(kept.len());
    let mut blank_run = 0;
    for line in &kept[start..] {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out.push("");
            }
            continue;
        }
        blank_run = 0;
        out.push(line.trim_end());
    }

    out.join("\n").trim().to_string()
}
