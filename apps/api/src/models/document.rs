use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic document and chunk ids.
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3c2e_8d4a_4f0b_9e57_2a1c_d0e4_7b93);

/// Where a document came from. Drives the source-type toggle at retrieval time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Resume,
    Experience,
    Book,
}

impl SourceType {
    pub const ALL: [SourceType; 3] = [SourceType::Resume, SourceType::Experience, SourceType::Book];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Resume => "resume",
            SourceType::Experience => "experience",
            SourceType::Book => "book",
        }
    }

    /// Folder name under the sources root.
    pub fn folder(&self) -> &'static str {
        match self {
            SourceType::Resume => "resumes",
            SourceType::Experience => "experiences",
            SourceType::Book => "books",
        }
    }

    pub fn from_folder(folder: &str) -> Option<Self> {
        match folder.to_lowercase().as_str() {
            "resumes" => Some(SourceType::Resume),
            "experiences" => Some(SourceType::Experience),
            "books" => Some(SourceType::Book),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resume" | "resumes" => Ok(SourceType::Resume),
            "experience" | "experiences" => Ok(SourceType::Experience),
            "book" | "books" => Ok(SourceType::Book),
            other => Err(format!(
                "unknown source type '{other}' (expected resume, experience or book)"
            )),
        }
    }
}

/// A loaded source document, immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_type: SourceType,
    /// Path relative to the sources root, with `/` separators.
    pub origin_filename: String,
    pub raw_text: String,
}

impl Document {
    /// The id is derived from the origin filename so re-ingestion replaces the
    /// previous version of the same file.
    pub fn new(source_type: SourceType, origin_filename: impl Into<String>, raw_text: String) -> Self {
        let origin_filename = origin_filename.into();
        Self {
            id: document_id(&origin_filename),
            source_type,
            origin_filename,
            raw_text,
        }
    }
}

pub fn document_id(origin_filename: &str) -> Uuid {
    Uuid::new_v5(&ID_NAMESPACE, origin_filename.as_bytes())
}

pub fn chunk_id(document_id: Uuid, position_index: u32) -> Uuid {
    let mut name = document_id.as_bytes().to_vec();
    name.extend_from_slice(&position_index.to_be_bytes());
    Uuid::new_v5(&ID_NAMESPACE, &name)
}

/// A contiguous slice of a document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub source_type: SourceType,
    pub origin_filename: String,
    pub text: String,
    pub position_index: u32,
    /// Character offsets into the document text, end exclusive.
    pub start_char: usize,
    pub end_char: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_parses_singular_and_plural() {
        assert_eq!("resume".parse::<SourceType>().unwrap(), SourceType::Resume);
        assert_eq!("Books".parse::<SourceType>().unwrap(), SourceType::Book);
        assert!("novel".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_source_type_serde_is_snake_case() {
        let json = serde_json::to_string(&SourceType::Experience).unwrap();
        assert_eq!(json, r#""experience""#);
    }

    #[test]
    fn test_document_id_is_stable_per_filename() {
        let a = Document::new(SourceType::Resume, "resumes/v1.txt", "a".into());
        let b = Document::new(SourceType::Resume, "resumes/v1.txt", "b".into());
        let c = Document::new(SourceType::Resume, "resumes/v2.txt", "a".into());
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_chunk_ids_differ_by_position() {
        let doc = document_id("resumes/v1.txt");
        assert_eq!(chunk_id(doc, 0), chunk_id(doc, 0));
        assert_ne!(chunk_id(doc, 0), chunk_id(doc, 1));
    }
}
