//! Ingestion pipeline orchestration

use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, SourceDocument};

use super::chunker::TextChunker;
use super::parser::{FileParser, ParsedDocument, ParserOptions};

/// Load + chunk pipeline for a single document
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    parser: FileParser,
    chunker: TextChunker,
    parse_timeout: Duration,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(parser: FileParser, chunker: TextChunker, parse_timeout: Duration) -> Self {
        Self {
            parser,
            chunker,
            parse_timeout,
        }
    }

    /// Build the pipeline from configuration
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let chunker = TextChunker::new(config.chunking.max_tokens, config.chunking.overlap_tokens)?;
        let parser = FileParser::new(ParserOptions {
            use_pdftotext: config.processing.use_pdftotext,
        });
        Ok(Self::new(
            parser,
            chunker,
            Duration::from_secs(config.processing.parse_timeout_secs),
        ))
    }

    /// Parse a file
    pub fn parse_file(&self, name: &str, data: &[u8]) -> Result<ParsedDocument> {
        self.parser.load(data, name)
    }

    /// Full ingestion: parse + chunk
    pub fn ingest(&self, name: &str, data: &[u8]) -> Result<(SourceDocument, Vec<Chunk>)> {
        let parsed = self.parse_file(name, data)?;

        let mut doc = SourceDocument::new(
            name.to_string(),
            parsed.file_type.clone(),
            parsed.content_hash.clone(),
            data.len() as u64,
        );
        doc.total_pages = parsed.total_pages;

        let chunks = self.chunker.chunk_document(&doc, &parsed);
        doc.total_chunks = chunks.len() as u32;

        Ok((doc, chunks))
    }

    /// Run [`ingest`](Self::ingest) on the blocking pool, bounded by the parse timeout
    pub async fn ingest_blocking(
        &self,
        name: &str,
        data: Arc<Vec<u8>>,
    ) -> Result<(SourceDocument, Vec<Chunk>)> {
        let pipeline = self.clone();
        let owned_name = name.to_string();
        let task = tokio::task::spawn_blocking(move || pipeline.ingest(&owned_name, &data));

        match tokio::time::timeout(self.parse_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::extraction(
                name,
                format!("extractor crashed: {}", join_err),
            )),
            Err(_) => Err(Error::extraction(
                name,
                format!("extraction exceeded {}s", self.parse_timeout.as_secs()),
            )),
        }
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self {
            parser: FileParser::default(),
            chunker: TextChunker::default(),
            parse_timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_text() {
        let pipeline = IngestPipeline::default();
        let (doc, chunks) = pipeline.ingest("notes.txt", b"hello world").unwrap();

        assert_eq!(doc.name, "notes.txt");
        assert_eq!(doc.size_bytes, 11);
        assert_eq!(doc.total_chunks, 1);
        assert_eq!(chunks[0].document_id, doc.id);
        assert_eq!(chunks[0].document_name, "notes.txt");
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        let pipeline = IngestPipeline::default();
        let (doc, chunks) = pipeline.ingest("empty.txt", b"").unwrap();
        assert_eq!(doc.total_chunks, 0);
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_blocking_propagates_errors() {
        let pipeline = IngestPipeline::default();
        let err = pipeline
            .ingest_blocking("image.bmp", Arc::new(vec![1, 2, 3]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
