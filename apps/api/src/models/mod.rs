pub mod document;

pub use document::{Chunk, Document, SourceType};
