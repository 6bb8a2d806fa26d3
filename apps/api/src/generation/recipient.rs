//! Best-effort extraction of the job title and addressee details from a job
//! description. Used to fill recipient fields the caller left blank.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::prompts::Recipient;

const MIN_FIELD_LEN: usize = 2;
const MIN_TITLE_LEN: usize = 5;
const MAX_FIELD_LEN: usize = 80;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedContact {
    pub job_title: String,
    pub recipient: Recipient,
}

struct Patterns {
    titles: Vec<Regex>,
    email: Regex,
    phone: Regex,
    managers: Vec<Regex>,
    organization: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        titles: [
            r"(?im)(?:Position|Job\s*Title|Title)\s*[:\-]\s*([^\n\r]{5,80})",
            r"(?i)(?:Seeking|Hiring)\s+(?:an?\s+)?([A-Za-z\s\-]+(?:Assistant|Analyst|Director|Coordinator|Specialist|Manager|Aide|Consultant))",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid title pattern"))
        .collect(),
        email: Regex::new(r"(?i)[A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,}").expect("valid email pattern"),
        phone: Regex::new(r"(?:\+?1[\s\-.]?)?\(?\d{3}\)?[\s\-.]?\d{3}[\s\-.]?\d{4}")
            .expect("valid phone pattern"),
        managers: [
            r"(?:Hiring\s+Manager|Hiring\s+Contact|Contact\s+Person|Contact)\s*[:\-]\s*(.+)",
            r"(?:ATTN|Attn|Attention)\s*[:\-]\s*(.+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid contact pattern"))
        .collect(),
        organization: Regex::new(
            r"California\s+State\s+Senate|California\s+State\s+Assembly|Office\s+of\s+[A-Z][^\n\r]{3,80}|Department\s+of\s+[A-Z][^\n\r]{3,80}|Committee\s+on\s+[A-Z][^\n\r]{3,80}",
        )
        .expect("valid organization pattern"),
    })
}

/// First segment of a capture, cut at a line break, comma or semicolon.
fn first_segment(text: &str) -> &str {
    text.split(['\n', '\r', ',', ';']).next().unwrap_or("").trim()
}

fn within(text: &str, min: usize) -> bool {
    (min..=MAX_FIELD_LEN).contains(&text.chars().count())
}

pub fn extract_contact(job_description: &str) -> ExtractedContact {
    let p = patterns();
    let mut out = ExtractedContact::default();

    if let Some(title) = p
        .titles
        .iter()
        .filter_map(|re| re.captures(job_description))
        .filter_map(|c| c.get(1).map(|m| first_segment(m.as_str())))
        .find(|t| within(t, MIN_TITLE_LEN))
    {
        out.job_title = title.to_string();
    }

    if let Some(m) = p.email.find(job_description) {
        out.recipient.email = m.as_str().to_string();
    }
    if let Some(m) = p.phone.find(job_description) {
        out.recipient.phone = m.as_str().trim().to_string();
    }

    if let Some(name) = p
        .managers
        .iter()
        .filter_map(|re| re.captures(job_description))
        .filter_map(|c| c.get(1).map(|m| first_segment(m.as_str())))
        .find(|n| within(n, MIN_FIELD_LEN))
    {
        out.recipient.hiring_manager = name.to_string();
    }

    if let Some(m) = p.organization.find(job_description) {
        out.recipient.organization = m.as_str().trim().to_string();
    }

    out
}

/// Fills blank fields of `recipient` (and the job title) from the job
/// description. Values the caller supplied always win.
pub fn fill_blanks(recipient: &mut Recipient, job_title: &mut Option<String>, job_description: &str) {
    let found = extract_contact(job_description);
    let fill = |target: &mut String, value: String| {
        if target.trim().is_empty() {
            *target = value;
        }
    };
    fill(&mut recipient.hiring_manager, found.recipient.hiring_manager);
    fill(&mut recipient.organization, found.recipient.organization);
    fill(&mut recipient.email, found.recipient.email);
    fill(&mut recipient.phone, found.recipient.phone);

    if job_title.as_deref().map_or(true, |t| t.trim().is_empty()) && !found.job_title.is_empty() {
        *job_title = Some(found.job_title);
    }
}
