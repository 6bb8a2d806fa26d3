//! Document loaders: turn files under the sources root into plain-text
//! `Document`s. Text extraction itself is delegated (`pdf-extract` for PDFs,
//! lossy UTF-8 for text files).

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ingestion::sanitizer::sanitize_resume_text;
use crate::models::document::{Document, SourceType};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type '{0}' (use PDF, TXT or Markdown)")]
    Unsupported(String),

    #[error("invalid file name '{0}'")]
    InvalidName(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract text from {path}: {message}")]
    Pdf { path: String, message: String },
}

/// Result of walking the sources root.
#[derive(Debug, Default)]
pub struct LoadedSources {
    pub documents: Vec<Document>,
    /// (origin filename, reason) for files that were found but not loaded.
    pub skipped: Vec<(String, String)>,
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

pub fn is_supported(name: &str) -> bool {
    let ext = extension_of(name);
    TEXT_EXTENSIONS.contains(&ext.as_str()) || PDF_EXTENSIONS.contains(&ext.as_str())
}

/// Infers the source type from the first folder below the root. Files in the
/// root or in unknown folders count as experience.
pub fn infer_source_type(path: &Path, root: &Path) -> SourceType {
    path.strip_prefix(root)
        .ok()
        .and_then(|rel| {
            let mut components = rel.components();
            let first = components.next()?;
            // A bare file name has no folder.
            components.next()?;
            first.as_os_str().to_str().and_then(SourceType::from_folder)
        })
        .unwrap_or(SourceType::Experience)
}

fn origin_name(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extracts plain text from in-memory file contents, dispatching on extension.
pub fn extract_text_from_bytes(name: &str, data: &[u8]) -> Result<String, LoadError> {
    let ext = extension_of(name);
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(String::from_utf8_lossy(data).into_owned());
    }
    if PDF_EXTENSIONS.contains(&ext.as_str()) {
        return pdf_extract::extract_text_from_mem(data).map_err(|e| LoadError::Pdf {
            path: name.to_string(),
            message: e.to_string(),
        });
    }
    Err(LoadError::Unsupported(ext))
}

/// Loads a single file. Returns `Ok(None)` when the file holds no text.
pub fn load_document(path: &Path, root: &Path) -> Result<Option<Document>, LoadError> {
    let origin = origin_name(path, root);
    if !is_supported(&origin) {
        return Err(LoadError::Unsupported(extension_of(&origin)));
    }
    let data = std::fs::read(path).map_err(|source| LoadError::Io {
        path: origin.clone(),
        source,
    })?;
    let text = extract_text_from_bytes(&origin, &data)?;

    let source_type = infer_source_type(path, root);
    let cleaned = match source_type {
        SourceType::Resume => sanitize_resume_text(&text),
        _ => text.trim().to_string(),
    };

    if cleaned.is_empty() {
        return Ok(None);
    }
    Ok(Some(Document::new(source_type, origin, cleaned)))
}

/// Recursively loads every supported file under `root`. A missing root yields
/// nothing; unreadable files are logged and skipped.
pub fn load_documents_from_dir(root: &Path) -> LoadedSources {
    let mut loaded = LoadedSources::default();
    if !root.exists() {
        warn!("Sources directory {} does not exist", root.display());
        return loaded;
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable path: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let origin = origin_name(path, root);
        if !is_supported(&origin) {
            debug!("Ignoring unsupported file {origin}");
            continue;
        }

        match load_document(path, root) {
            Ok(Some(doc)) => loaded.documents.push(doc),
            Ok(None) => loaded.skipped.push((origin, "no text".to_string())),
            Err(e) => {
                warn!("Could not load {origin}: {e}");
                loaded.skipped.push((origin, e.to_string()));
            }
        }
    }

    loaded
}

/// Saves an uploaded file into the folder for `source_type`, keeping only the
/// final path component of the supplied name.
pub fn save_upload(
    root: &Path,
    source_type: SourceType,
    filename: &str,
    data: Bytes,
) -> Result<PathBuf, LoadError> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.starts_with('.'))
        .ok_or_else(|| LoadError::InvalidName(filename.to_string()))?;
    if !is_supported(name) {
        return Err(LoadError::Unsupported(extension_of(name)));
    }

    let dir = root.join(source_type.folder());
    let dest = dir.join(name);
    let io_err = |source| LoadError::Io {
        path: dest.display().to_string(),
        source,
    };
    std::fs::create_dir_all(&dir).map_err(io_err)?;
    std::fs::write(&dest, &data).map_err(io_err)?;
    Ok(dest)
}
