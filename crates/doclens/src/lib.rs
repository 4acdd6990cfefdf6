//! doclens: document Q&A over user-uploaded files
//!
//! Uploaded documents (PDF, Word, PowerPoint, spreadsheets, HTML, Markdown,
//! CSV, plain text and source code) are extracted page by page, split into
//! overlapping token windows, embedded and kept in an in-memory vector index.
//! Questions are answered by retrieving the closest chunks and asking a
//! language model to answer from them in French, English, Spanish or Arabic,
//! citing the source document and page.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod lifecycle;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use lifecycle::{DocumentUpload, ReconcileReport};
pub use session::Session;
pub use types::{
    AnswerRecord, Chunk, DocumentId, FileType, Language, QueryRequest, QueryResponse, Rating,
    SourceDocument,
};
