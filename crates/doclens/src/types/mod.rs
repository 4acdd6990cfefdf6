//! Core types for the document Q&A pipeline

pub mod document;
pub mod feedback;
pub mod query;

pub use document::{Chunk, DocumentId, FileType, SourceDocument};
pub use feedback::{AnswerRecord, Rating};
pub use query::{Language, QueryRequest, QueryResponse};
