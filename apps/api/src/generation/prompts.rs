// Prompt constants and builders for resume and cover letter generation.
// The retrieved context block is produced by `retrieval::format_context`.

use serde::{Deserialize, Serialize};

/// Writing rules every generated document must follow.
pub const WRITING_RULES: &str = "\
WRITING GUIDELINES (for job applications):
- Be brief: Get to the point quickly. Cover letters: one page max.
- Introduce yourself simply: State your role or affiliation, not a biography.
- Be specific: Match concrete job requirements with concrete examples and outcomes.
- Make it personal: Use your own words. Tailor each application.
- Give your reasons: Explain clearly why you are a fit and what you bring.
- Be constructive: Focus on what you can contribute.
- Be courteous: Professional tone throughout.
- Don't be vague: Use outcomes, metrics and examples.
- Don't apologize: No weak openings or apologies for taking their time.
- Don't overstate: Credibility matters more than superlatives.";

const BASE_INSTRUCTIONS: &str = "\
You are an expert resume and cover letter writer.
Match language and requirements from the job description.
Use ONLY information from the provided context. Do not invent experience or qualifications.";

const RESUME_INSTRUCTIONS: &str = "\
For resumes: Use ATS-friendly formatting. No tables, no graphics, no columns.
Use standard section headers: Experience, Education, Skills.
Simple bullet points. Plain text suitable for applicant tracking systems.

CRITICAL: Do not mention a target office, person or committee unless it appears in the JOB DESCRIPTION.
If the context contains office-specific phrases from past tailored resumes, ignore them unless they are clearly past experience.";

const COVER_LETTER_INSTRUCTIONS: &str = "\
For cover letters: Professional, concise tone.
Structure: greeting, 2-3 paragraphs, sign-off.

CRITICAL: The RECIPIENT block is the ONLY source for addressee details.
- Hiring manager, organization and job title come ONLY from the RECIPIENT block.
- IGNORE hiring manager, office or contact names in the JOB DESCRIPTION or context; they may come from other postings.
- If a hiring manager is given, use that exact name in the salutation (e.g. \"Dear Ms. Garcia,\").
- Use MY CONTACT INFO for the signature. Never write [Your Name]; use the name provided.";

/// The applicant's own details, used for headers and signatures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicantContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

/// Addressee details for a cover letter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Recipient {
    #[serde(default)]
    pub hiring_manager: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl Recipient {
    pub fn is_empty(&self) -> bool {
        [&self.hiring_manager, &self.organization, &self.email, &self.phone]
            .iter()
            .all(|f| f.trim().is_empty())
    }
}

/// A (system, user) prompt pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn resume_system() -> String {
    format!("You MUST follow these writing guidelines:\n{WRITING_RULES}\n\n{BASE_INSTRUCTIONS}\n\n{RESUME_INSTRUCTIONS}")
}

pub fn cover_letter_system() -> String {
    format!("You MUST follow these writing guidelines:\n{WRITING_RULES}\n\n{BASE_INSTRUCTIONS}\n\n{COVER_LETTER_INSTRUCTIONS}")
}

/// Renders labelled non-empty lines under a heading, or nothing.
fn block(heading: &str, lines: &[(&str, &str)]) -> String {
    let present: Vec<String> = lines
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(label, v)| format!("{label}: {}", v.trim()))
        .collect();
    if present.is_empty() {
        return String::new();
    }
    format!("{heading}\n{}\n\n", present.join("\n"))
}

pub fn build_resume_prompt(
    job_description: &str,
    context: &str,
    job_title: Option<&str>,
    contact: &ApplicantContact,
) -> Prompt {
    let contact_block = block(
        "MY CONTACT INFO (use to populate the resume header):",
        &[
            ("Name", contact.name.as_str()),
            ("Address", contact.address.as_str()),
            ("Phone", contact.phone.as_str()),
            ("Email", contact.email.as_str()),
        ],
    );

    let mut user = format!(
        "{contact_block}JOB DESCRIPTION:\n{job_description}\n\n\
         RELEVANT INFORMATION FROM MY BACKGROUND (use only this, do not invent):\n{context}\n\n\
         Generate a tailored resume that matches the job requirements. Use only the information above.\n\
         If MY CONTACT INFO is provided, include it at the top in a clean ATS-friendly header."
    );
    if let Some(title) = job_title.map(str::trim).filter(|t| !t.is_empty()) {
        user = format!("Job title: {title}\n\n{user}");
    }

    Prompt {
        system: resume_system(),
        user,
    }
}

pub fn build_cover_letter_prompt(
    job_description: &str,
    context: &str,
    job_title: Option<&str>,
    recipient: &Recipient,
    contact: &ApplicantContact,
) -> Prompt {
    let recipient_block = block(
        "RECIPIENT / CONTACT INFO (USE ONLY THESE VALUES for addressee, office and position; \
         do NOT use names or offices from the job description or context below):",
        &[
            ("Job title / Position", job_title.unwrap_or("")),
            ("Hiring manager (use for salutation)", recipient.hiring_manager.as_str()),
            ("Organization/Office", recipient.organization.as_str()),
            ("Contact email", recipient.email.as_str()),
            ("Contact phone", recipient.phone.as_str()),
        ],
    );
    let contact_block = block(
        "MY CONTACT INFO (use for signature / header as appropriate):",
        &[
            ("My name", contact.name.as_str()),
            ("My address", contact.address.as_str()),
            ("My phone", contact.phone.as_str()),
            ("My email", contact.email.as_str()),
        ],
    );

    let user = format!(
        "{recipient_block}{contact_block}JOB DESCRIPTION:\n{job_description}\n\n\
         RELEVANT INFORMATION FROM MY BACKGROUND (use this to tailor the letter, highlighting relevant experience and skills):\n{context}\n\n\
         Generate a professional cover letter (one page max). Use ONLY the hiring manager, organization and job title \
         from the RECIPIENT block; ignore any such details in the job description or background."
    );

    Prompt {
        system: cover_letter_system(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_prompt_includes_rules_context_and_title() {
        let prompt = build_resume_prompt(
            "Legislative Aide, policy analysis",
            "[Source: resumes/v1.txt (resume)]\nDrafted bill analyses",
            Some("Legislative Aide"),
            &ApplicantContact::default(),
        );
        assert!(prompt.system.contains("Be brief"));
        assert!(prompt.system.contains("ATS-friendly"));
        assert!(prompt.user.starts_with("Job title: Legislative Aide\n\n"));
        assert!(prompt.user.contains("Drafted bill analyses"));
        assert!(!prompt.user.contains("MY CONTACT INFO ("), "no empty contact block");
    }

    #[test]
    fn test_resume_prompt_contact_block_skips_blank_fields() {
        let contact = ApplicantContact {
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            phone: "  ".into(),
            address: String::new(),
        };
        let prompt = build_resume_prompt("JD", "ctx", None, &contact);
        assert!(prompt
            .user
            .starts_with("MY CONTACT INFO (use to populate the resume header):\nName: Jane Doe\nEmail: jane@example.com\n\n"));
        assert!(!prompt.user.contains("Phone:"));
    }

    #[test]
    fn test_cover_letter_prompt_puts_recipient_first() {
        let recipient = Recipient {
            hiring_manager: "Ms. Garcia".into(),
            organization: "Office of Assemblymember Lee".into(),
            ..Recipient::default()
        };
        let contact = ApplicantContact {
            name: "Jane Doe".into(),
            ..ApplicantContact::default()
        };
        let prompt =
            build_cover_letter_prompt("JD text", "ctx", Some("Legislative Aide"), &recipient, &contact);

        assert!(prompt.system.contains("RECIPIENT block is the ONLY source"));
        assert!(prompt.user.starts_with("RECIPIENT / CONTACT INFO"));
        assert!(prompt.user.contains("Hiring manager (use for salutation): Ms. Garcia"));
        assert!(prompt.user.contains("Job title / Position: Legislative Aide"));
        assert!(prompt.user.contains("My name: Jane Doe"));
        let recipient_at = prompt.user.find("RECIPIENT").unwrap();
        let jd_at = prompt.user.find("JOB DESCRIPTION").unwrap();
        assert!(recipient_at < jd_at);
    }

    #[test]
    fn test_recipient_is_empty() {
        assert!(Recipient::default().is_empty());
        assert!(!Recipient {
            email: "hr@example.gov".into(),
            ..Recipient::default()
        }
        .is_empty());
    }
}
