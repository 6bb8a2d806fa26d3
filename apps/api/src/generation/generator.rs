//! Generation: turns retrieved context into a tailored resume or cover letter.
//!
//! Flow: retrieve (caller, under the index lock) → format_context →
//!       build prompt → LLM call → response with source previews.
//!
//! Generation never runs without grounding: an unbuilt index is surfaced by
//! the retriever and an empty context set is rejected here.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::generation::prompts::{
    build_cover_letter_prompt, build_resume_prompt, ApplicantContact, Prompt, Recipient,
};
use crate::generation::recipient::fill_blanks;
use crate::llm_client::LlmClient;
use crate::models::document::SourceType;
use crate::retrieval::{format_context, KeywordQueryMode, RetrievalResult};

/// Characters of chunk text shown in source previews.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

/// Request body for both generation endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    pub job_description: String,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub contact: ApplicantContact,
    /// Cover letters only. Blank fields are filled from the job description.
    #[serde(default)]
    pub recipient: Recipient,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub source_types: Option<Vec<SourceType>>,
    #[serde(default)]
    pub keyword_mode: Option<KeywordQueryMode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcePreview {
    pub origin_filename: String,
    pub source_type: SourceType,
    pub score: f32,
    pub preview: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub kind: DocumentKind,
    pub text: String,
    pub job_title: Option<String>,
    /// The addressee actually used (cover letters only).
    pub recipient: Option<Recipient>,
    pub sources: Vec<SourcePreview>,
    pub keywords: Vec<String>,
}

/// Builds the prompt for `kind` from a retrieval result. Returns the prompt,
/// the job title used and (for cover letters) the resolved recipient.
pub fn assemble_prompt(
    kind: DocumentKind,
    request: &GenerateRequest,
    retrieved: &RetrievalResult,
) -> Result<(Prompt, Option<String>, Option<Recipient>), AppError> {
    if retrieved.chunks.is_empty() {
        return Err(AppError::Validation(
            "No indexed documents match the enabled source types".to_string(),
        ));
    }
    let context = format_context(&retrieved.chunks);
    let mut job_title = request
        .job_title
        .clone()
        .filter(|t| !t.trim().is_empty());

    match kind {
        DocumentKind::Resume => {
            let prompt = build_resume_prompt(
                &request.job_description,
                &context,
                job_title.as_deref(),
                &request.contact,
            );
            Ok((prompt, job_title, None))
        }
        DocumentKind::CoverLetter => {
            let mut recipient = request.recipient.clone();
            fill_blanks(&mut recipient, &mut job_title, &request.job_description);
            let prompt = build_cover_letter_prompt(
                &request.job_description,
                &context,
                job_title.as_deref(),
                &recipient,
                &request.contact,
            );
            Ok((prompt, job_title, Some(recipient)))
        }
    }
}

pub async fn generate(
    kind: DocumentKind,
    request: &GenerateRequest,
    retrieved: RetrievalResult,
    llm: &LlmClient,
) -> Result<GenerateResponse, AppError> {
    let (prompt, job_title, recipient) = assemble_prompt(kind, request, &retrieved)?;

    info!(
        "Generating {:?} from {} chunks with {}",
        kind,
        retrieved.chunks.len(),
        llm.model()
    );
    let text = llm.call_text(&prompt.user, &prompt.system).await?;

    let sources = retrieved
        .chunks
        .iter()
        .map(|c| SourcePreview {
            origin_filename: c.chunk.origin_filename.clone(),
            source_type: c.chunk.source_type,
            score: c.score,
            preview: c.chunk.text.chars().take(PREVIEW_CHARS).collect(),
        })
        .collect();
    let keywords = retrieved
        .keywords
        .entries()
        .iter()
        .map(|e| e.keyword.clone())
        .collect();

    Ok(GenerateResponse {
        kind,
        text,
        job_title,
        recipient,
        sources,
        keywords,
    })
}
