//! Document ingestion: multi-format loading and token-window chunking

pub mod chunker;
pub mod external_parser;
pub mod parser;
mod processor;

pub use chunker::{reconstruct, ChunkSpan, TextChunker};
pub use external_parser::PdfToText;
pub use parser::{FileParser, PageContent, ParsedDocument, ParserOptions};
pub use processor::IngestPipeline;
